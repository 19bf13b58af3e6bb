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

//! Parsing of NetStorage XML bodies.
//!
//! Metadata verbs answer with small XML documents; mutating verbs often
//! answer with plain-text or HTML bodies. Anything that does not begin with
//! an XML prolog normalizes to a status record carrying the HTTP code, so
//! callers never branch on body shape.

use serde::de::DeserializeOwned;

use crate::http::{
    error::{NetStorageError, Result},
    models::{DuResponse, DuXml, StatResponse, StatXml, StatusDocument, StatusXml},
};

/// Returns `true` when the body (after leading whitespace) is an XML document.
#[must_use]
pub fn looks_like_xml(body: &str) -> bool {
    body.trim_start().starts_with("<?xml")
}

/// Extracts the name of the document's root element.
#[must_use]
pub fn root_element_name(body: &str) -> Option<String> {
    let mut rest = body.trim_start();
    loop {
        rest = rest.strip_prefix('<')?.trim_start();
        if let Some(after) = rest.strip_prefix('?') {
            // Prolog: skip through "?>".
            rest = after.split_once("?>")?.1.trim_start();
            continue;
        }
        if let Some(after) = rest.strip_prefix('!') {
            // Comment or doctype: skip through the closing angle bracket.
            rest = after.split_once('>')?.1.trim_start();
            continue;
        }
        let name: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
            .collect();
        return if name.is_empty() { None } else { Some(name) };
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    quick_xml::de::from_str(body).map_err(|e| NetStorageError::Xml(e.to_string()))
}

/// Parses a `stat`/`dir` body, tolerating `<status>` and non-XML answers.
///
/// # Errors
///
/// Returns [`NetStorageError::Xml`] when the body claims to be XML but does
/// not decode into a known NetStorage document.
pub fn parse_stat_response(http_status: u16, body: &str) -> Result<StatResponse> {
    if !looks_like_xml(body) {
        return Ok(StatResponse {
            directory: None,
            entries: Vec::new(),
            status: StatusDocument::from_http(http_status),
        });
    }
    match root_element_name(body).as_deref() {
        Some("stat") | Some("list") => {
            let doc: StatXml = decode(body)?;
            Ok(StatResponse {
                directory: doc.directory,
                entries: doc.files,
                status: StatusDocument::from_http(http_status),
            })
        }
        Some("status") => {
            let doc: StatusXml = decode(body)?;
            Ok(StatResponse {
                directory: None,
                entries: Vec::new(),
                status: doc.into(),
            })
        }
        other => Err(NetStorageError::Xml(format!(
            "unexpected root element {other:?} in stat response"
        ))),
    }
}

/// Parses a `du` body, tolerating `<status>` and non-XML answers.
///
/// # Errors
///
/// Returns [`NetStorageError::Xml`] when the body claims to be XML but does
/// not decode into a known NetStorage document.
pub fn parse_du_response(http_status: u16, body: &str) -> Result<DuResponse> {
    if !looks_like_xml(body) {
        return Ok(DuResponse {
            directory: None,
            info: None,
            status: StatusDocument::from_http(http_status),
        });
    }
    match root_element_name(body).as_deref() {
        Some("du") => {
            let doc: DuXml = decode(body)?;
            Ok(DuResponse {
                directory: doc.directory,
                info: Some(doc.info),
                status: StatusDocument::from_http(http_status),
            })
        }
        Some("status") => {
            let doc: StatusXml = decode(body)?;
            Ok(DuResponse {
                directory: None,
                info: None,
                status: doc.into(),
            })
        }
        other => Err(NetStorageError::Xml(format!(
            "unexpected root element {other:?} in du response"
        ))),
    }
}

/// Parses a mutating-verb body into a status record.
///
/// Non-XML bodies and XML documents of unknown shape both fall back to the
/// HTTP status.
#[must_use]
pub fn parse_status_response(http_status: u16, body: &str) -> StatusDocument {
    if looks_like_xml(body) && root_element_name(body).as_deref() == Some("status") {
        if let Ok(doc) = decode::<StatusXml>(body) {
            return doc.into();
        }
    }
    StatusDocument::from_http(http_status)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::http::models::RemoteEntryType;

    const STAT_SINGLE: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<stat directory="/dir">
  <file type="file" name="a.txt" size="1024" mtime="1700000000" md5="d41d8cd98f00b204e9800998ecf8427e"/>
</stat>"#;

    const DIR_LISTING: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<stat directory="/r">
  <file type="dir" name="A" implicit="true" bytes="35" files="2"/>
  <file type="file" name="b.txt" size="10" mtime="1700000001"/>
  <file type="symlink" name="link" target="/r/b.txt"/>
</stat>"#;

    const DU_BODY: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<du directory="/r">
  <du-info files="12" bytes="34567"/>
</du>"#;

    const STATUS_BODY: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<status code="200" message="OK"/>"#;

    #[rstest]
    #[case("<?xml version=\"1.0\"?><stat/>", true)]
    #[case("  \n<?xml version=\"1.0\"?><stat/>", true)]
    #[case("<html><body>OK</body></html>", false)]
    #[case("plain text", false)]
    #[case("", false)]
    fn test_looks_like_xml(#[case] body: &str, #[case] expected: bool) {
        assert_eq!(looks_like_xml(body), expected);
    }

    #[rstest]
    #[case(STAT_SINGLE, Some("stat"))]
    #[case(DU_BODY, Some("du"))]
    #[case(STATUS_BODY, Some("status"))]
    #[case("<!-- c --><list/>", Some("list"))]
    #[case("no xml here", None)]
    fn test_root_element_name(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(root_element_name(body).as_deref(), expected);
    }

    #[rstest]
    fn test_parse_stat_single_file() {
        let response = parse_stat_response(200, STAT_SINGLE).unwrap();
        assert_eq!(response.directory.as_deref(), Some("/dir"));
        assert_eq!(response.entries.len(), 1);

        let file = response.file().unwrap();
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.entry_type, RemoteEntryType::File);
        assert_eq!(file.parsed_size(), Some(1024));
        assert_eq!(file.parsed_mtime(), Some(1_700_000_000));
        assert_eq!(file.md5.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[rstest]
    fn test_parse_dir_listing_preserves_order_and_kinds() {
        let response = parse_stat_response(200, DIR_LISTING).unwrap();
        assert_eq!(response.entries.len(), 3);
        assert!(response.entries[0].is_dir());
        assert!(response.entries[0].is_implicit());
        assert!(response.entries[1].is_file());
        assert!(response.entries[2].is_symlink());
        assert_eq!(response.entries[2].target.as_deref(), Some("/r/b.txt"));
    }

    #[rstest]
    fn test_parse_stat_status_document() {
        let response = parse_stat_response(200, STATUS_BODY).unwrap();
        assert!(response.entries.is_empty());
        assert_eq!(response.status.code, 200);
        assert_eq!(response.status.message.as_deref(), Some("OK"));
    }

    #[rstest]
    fn test_parse_stat_non_xml_falls_back_to_http_status() {
        let response = parse_stat_response(207, "<html>OK</html>").unwrap();
        assert!(response.entries.is_empty());
        assert_eq!(response.status.code, 207);
    }

    #[rstest]
    fn test_parse_du() {
        let response = parse_du_response(200, DU_BODY).unwrap();
        assert_eq!(response.directory.as_deref(), Some("/r"));
        let info = response.info.unwrap();
        assert_eq!(info.files, 12);
        assert_eq!(info.bytes, 34_567);
    }

    #[rstest]
    fn test_parse_status_response_tolerates_anything() {
        assert_eq!(parse_status_response(200, "OK").code, 200);
        assert_eq!(parse_status_response(200, STATUS_BODY).message.as_deref(), Some("OK"));
        assert_eq!(parse_status_response(201, DU_BODY).code, 201);
    }

    #[rstest]
    fn test_parse_stat_garbage_xml_is_an_error() {
        let result = parse_stat_response(200, "<?xml version=\"1.0\"?><surprise/>");
        assert!(result.is_err());
    }
}
