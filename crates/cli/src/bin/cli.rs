// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

use clap::Parser;
use netstorage_cli::opt::{GlobalOpts, NetStorageCli};
use tracing_subscriber::EnvFilter;

fn init_tracing(global: &GlobalOpts) {
    // The CLI levels `verbose` and `debug` map onto tracing's debug and
    // trace levels.
    let level = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        match global.log_level.as_deref() {
            Some("error") => "error",
            Some("warn") => "warn",
            Some("verbose") => "debug",
            Some("debug") => "trace",
            Some("info") | None => "info",
            Some(other) => {
                eprintln!("unknown log level `{other}`, using info");
                "info"
            }
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("netstorage={level},netstorage_cli={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = NetStorageCli::parse();
    init_tracing(&cli.global);

    if let Err(e) = netstorage_cli::run(cli).await {
        eprintln!("{}", netstorage_cli::render_error(&e));
        std::process::exit(1);
    }
}
