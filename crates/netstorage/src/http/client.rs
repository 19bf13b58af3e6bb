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

//! Provides the HTTP client for the **Akamai NetStorage ACS API**.
//!
//! The core type exported by this module is [`NetStorageClient`]. It offers a
//! strongly-typed interface to every NetStorage verb currently required by
//! the library surface.
//!
//! Key responsibilities handled internally:
//! • Request signing and header composition (HMAC-SHA256 ACS triple).
//! • Per-operation-class token-bucket admission.
//! • Bounded retries with exponential backoff for transient failures.
//! • Buffered XML decoding for metadata verbs and streaming bodies for
//!   `upload`/`download`.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH},
    Method, Response,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::{io::ReaderStream, sync::CancellationToken};

use crate::{
    common::{
        consts::{ERROR_BODY_SNIPPET_MAX, NETSTORAGE_USER_AGENT},
        credential::{unique_id, unix_seconds_now, Credential},
        urls,
    },
    config::NetStorageConfig,
    http::{
        error::{NetStorageError, Result},
        models::{DownloadOutcome, DuResponse, StatResponse, StatusDocument, UploadOutcome},
        parse,
        query::ActionQuery,
    },
    ratelimiter::RateLimiterSet,
    retry::RetryManager,
};

const HEADER_ACS_ACTION: HeaderName = HeaderName::from_static("x-akamai-acs-action");
const HEADER_ACS_AUTH_DATA: HeaderName = HeaderName::from_static("x-akamai-acs-auth-data");
const HEADER_ACS_AUTH_SIGN: HeaderName = HeaderName::from_static("x-akamai-acs-auth-sign");

/// Byte-count observer invoked as a streaming transfer progresses.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Per-call cancellation and timeout overrides.
///
/// Resolution precedence: an explicit cancellation token always applies;
/// the per-call timeout overrides the config-wide one.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Per-call timeout override in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Cooperative cancellation token.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Options with a per-call timeout.
    #[must_use]
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout_ms: Some(timeout_ms),
            ..Default::default()
        }
    }

    /// Options with a cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..Default::default()
        }
    }

    fn effective_timeout(&self, config: &NetStorageConfig) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(config.timeout_ms))
    }
}

/// Provides an HTTP client for connecting to a NetStorage storage group.
///
/// This client owns the shared connection pool, the per-class rate limiters,
/// and the retry driver; every operation routes through all three. The
/// configuration is immutable once the client is constructed.
pub struct NetStorageClient {
    config: Arc<NetStorageConfig>,
    credential: Credential,
    client: reqwest::Client,
    limiters: RateLimiterSet,
    retry: RetryManager,
}

impl std::fmt::Debug for NetStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(NetStorageClient))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NetStorageClient {
    /// Creates a new [`NetStorageClient`] from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetStorageError::ConfigValidation`] if a required field is
    /// empty, or [`NetStorageError::Internal`] if the HTTP pool cannot be
    /// constructed.
    pub fn new(config: NetStorageConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(NETSTORAGE_USER_AGENT)
            .build()
            .map_err(|e| NetStorageError::Internal(format!("failed to build HTTP pool: {e}")))?;
        let credential = Credential::new(config.key.clone(), config.key_name.clone());
        let limiters = RateLimiterSet::new(&config.rate_limits);
        let retry = RetryManager::new(config.retry);
        Ok(Self {
            config: Arc::new(config),
            credential,
            client,
            limiters,
            retry,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &NetStorageConfig {
        &self.config
    }

    /// Builds the signed ACS header triple for one attempt.
    ///
    /// Each attempt signs afresh so retried requests carry a current
    /// timestamp and nonce.
    fn build_headers(&self, path: &str, query: &ActionQuery) -> Result<HeaderMap> {
        let acs = self.credential.acs_headers(
            &self.config.signing_path(path),
            &query.encode(),
            unix_seconds_now(),
            &unique_id(),
        );
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(HEADER_ACS_ACTION, header_value(&acs.action)?);
        headers.insert(HEADER_ACS_AUTH_DATA, header_value(&acs.auth_data)?);
        headers.insert(HEADER_ACS_AUTH_SIGN, header_value(&acs.auth_sign)?);
        Ok(headers)
    }

    /// Sends a buffered request through admission control and the retry
    /// driver, returning the HTTP status and the full response body.
    async fn request_buffered(
        &self,
        query: ActionQuery,
        path: &str,
        options: &RequestOptions,
    ) -> Result<(u16, String)> {
        let verb = query.verb();
        let method = verb.method();
        let url = self.config.uri(path);
        let limiter = self.limiters.for_class(verb.class());
        let timeout = options.effective_timeout(&self.config);
        let cancel = options.cancel.clone();
        let operation = format!("{verb} {path}");

        self.retry
            .execute(
                &operation,
                cancel.as_ref(),
                || limiter.acquire(),
                NetStorageError::is_retryable,
                || {
                    let method = method.clone();
                    let url = url.clone();
                    let query = query.clone();
                    let cancel = cancel.clone();
                    async move {
                        let headers = self.build_headers(path, &query)?;
                        self.send_buffered_once(method, url, headers, timeout, cancel.as_ref())
                            .await
                    }
                },
            )
            .await
    }

    async fn send_buffered_once(
        &self,
        method: Method,
        url: String,
        headers: HeaderMap,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<(u16, String)> {
        tracing::debug!("{method} {url}");
        let what = url.clone();
        let request = async {
            let response = self
                .client
                .request(method.clone(), url.as_str())
                .headers(headers)
                .send()
                .await
                .map_err(|e| NetStorageError::from_transport(&e, method.as_str(), &url))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| NetStorageError::from_transport(&e, method.as_str(), &url))?;

            if status >= 300 {
                tracing::debug!("HTTP {status} for {method} {url}: {body}");
                Err(NetStorageError::Http {
                    status,
                    method: method.to_string(),
                    url,
                    body: truncate_snippet(body),
                })
            } else {
                Ok((status, body))
            }
        };
        with_deadline(request, timeout, cancel, &what).await
    }

    // -------------------------------------------------------------------------------------------
    // Metadata verbs
    // -------------------------------------------------------------------------------------------

    /// Requests metadata for a single path.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// decoded.
    pub async fn stat(&self, path: &str, options: &RequestOptions) -> Result<StatResponse> {
        let (status, body) = self
            .request_buffered(ActionQuery::stat(), path, options)
            .await?;
        parse::parse_stat_response(status, &body)
    }

    /// Requests one server page of a directory listing.
    ///
    /// The driver does not paginate; very large directories return whatever
    /// single page the server chooses to serve.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// decoded.
    pub async fn dir(&self, path: &str, options: &RequestOptions) -> Result<StatResponse> {
        let (status, body) = self
            .request_buffered(ActionQuery::dir(), path, options)
            .await?;
        parse::parse_stat_response(status, &body)
    }

    /// Requests aggregate disk usage for a directory.
    ///
    /// Succeeds for implicit directories, which makes it the fallback probe
    /// behind [`Self::is_directory`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// decoded.
    pub async fn du(&self, path: &str, options: &RequestOptions) -> Result<DuResponse> {
        let (status, body) = self
            .request_buffered(ActionQuery::du(), path, options)
            .await?;
        parse::parse_du_response(status, &body)
    }

    // -------------------------------------------------------------------------------------------
    // Mutating verbs
    // -------------------------------------------------------------------------------------------

    /// Creates a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mkdir(&self, path: &str, options: &RequestOptions) -> Result<StatusDocument> {
        let (status, body) = self
            .request_buffered(ActionQuery::mkdir(), path, options)
            .await?;
        Ok(parse::parse_status_response(status, &body))
    }

    /// Removes an empty, explicit directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn rmdir(&self, path: &str, options: &RequestOptions) -> Result<StatusDocument> {
        let (status, body) = self
            .request_buffered(ActionQuery::rmdir(), path, options)
            .await?;
        Ok(parse::parse_status_response(status, &body))
    }

    /// Removes a file or symlink.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn rm(&self, path: &str, options: &RequestOptions) -> Result<StatusDocument> {
        let (status, body) = self
            .request_buffered(ActionQuery::rm(), path, options)
            .await?;
        Ok(parse::parse_status_response(status, &body))
    }

    /// Renames a path within the same storage group.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn rename(
        &self,
        path_from: &str,
        path_to: &str,
        options: &RequestOptions,
    ) -> Result<StatusDocument> {
        let destination = urls::with_cp_code(path_to, self.config.cp_code.as_deref());
        let (status, body) = self
            .request_buffered(ActionQuery::rename(&destination), path_from, options)
            .await?;
        Ok(parse::parse_status_response(status, &body))
    }

    /// Creates a symlink at `path` pointing to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn symlink(
        &self,
        path: &str,
        target: &str,
        options: &RequestOptions,
    ) -> Result<StatusDocument> {
        let (status, body) = self
            .request_buffered(ActionQuery::symlink(target), path, options)
            .await?;
        Ok(parse::parse_status_response(status, &body))
    }

    /// Sets the modification time of a path.
    ///
    /// # Errors
    ///
    /// Returns [`NetStorageError::NotADate`] if `unix_seconds` is not a valid
    /// instant, or an error if the request fails.
    pub async fn set_mtime(
        &self,
        path: &str,
        unix_seconds: i64,
        options: &RequestOptions,
    ) -> Result<StatusDocument> {
        if chrono::DateTime::from_timestamp(unix_seconds, 0).is_none() {
            return Err(NetStorageError::NotADate {
                value: unix_seconds,
            });
        }
        let (status, body) = self
            .request_buffered(ActionQuery::mtime(unix_seconds), path, options)
            .await?;
        Ok(parse::parse_status_response(status, &body))
    }

    // -------------------------------------------------------------------------------------------
    // Streaming verbs
    // -------------------------------------------------------------------------------------------

    /// Uploads raw bytes from a reader.
    ///
    /// A generic reader cannot be replayed, so this path makes exactly one
    /// attempt; prefer [`Self::upload_file`] when retries matter.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers non-2xx.
    pub async fn upload<R>(
        &self,
        path: &str,
        reader: R,
        content_length: Option<u64>,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<UploadOutcome>
    where
        R: AsyncRead + Send + 'static,
    {
        let query = ActionQuery::upload();
        self.limiters.for_class(query.verb().class()).acquire().await;
        self.upload_stream_once(path, &query, reader, content_length, options, on_progress)
            .await
    }

    /// Uploads a local file, retrying transient failures by reopening it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the request fails, or
    /// the server answers non-2xx.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<UploadOutcome> {
        let query = ActionQuery::upload();
        let limiter = self.limiters.for_class(query.verb().class());
        let cancel = options.cancel.clone();
        let operation = format!("upload {remote_path}");

        self.retry
            .execute(
                &operation,
                cancel.as_ref(),
                || limiter.acquire(),
                NetStorageError::is_retryable,
                || {
                    let query = query.clone();
                    let on_progress = on_progress.clone();
                    async move {
                        let file = tokio::fs::File::open(local_path).await?;
                        let len = file.metadata().await?.len();
                        self.upload_stream_once(
                            remote_path,
                            &query,
                            file,
                            Some(len),
                            options,
                            on_progress,
                        )
                        .await
                    }
                },
            )
            .await
    }

    async fn upload_stream_once<R>(
        &self,
        path: &str,
        query: &ActionQuery,
        reader: R,
        content_length: Option<u64>,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<UploadOutcome>
    where
        R: AsyncRead + Send + 'static,
    {
        let url = self.config.uri(path);
        let headers = self.build_headers(path, query)?;
        let timeout = options.effective_timeout(&self.config);
        let cancel = options.cancel.clone();

        let sent = Arc::new(AtomicU64::new(0));
        let counter = sent.clone();
        let stream = ReaderStream::new(reader).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                let total = counter.fetch_add(bytes.len() as u64, Ordering::Relaxed)
                    + bytes.len() as u64;
                if let Some(progress) = &on_progress {
                    progress(total);
                }
            }
        });

        tracing::debug!("PUT {url} (streaming upload)");
        let request = async {
            let mut builder = self.client.put(url.as_str()).headers(headers);
            if let Some(len) = content_length {
                builder = builder.header(CONTENT_LENGTH, len);
            }
            let response = builder
                .body(reqwest::Body::wrap_stream(stream))
                .send()
                .await
                .map_err(|e| NetStorageError::from_transport(&e, "PUT", &url))?;

            let status = response.status().as_u16();
            if status >= 300 {
                let body = read_snippet(response).await;
                return Err(NetStorageError::Http {
                    status,
                    method: "PUT".to_string(),
                    url,
                    body,
                });
            }
            Ok(status)
        };

        let status = with_deadline(request, timeout, cancel.as_ref(), path).await?;
        Ok(UploadOutcome {
            status: StatusDocument::from_http(status),
            bytes_transferred: sent.load(Ordering::Relaxed),
        })
    }

    /// Downloads a remote file into a writer.
    ///
    /// A generic writer cannot be rewound, so this path makes exactly one
    /// attempt; prefer [`Self::download_file`] when retries matter.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers non-2xx, or
    /// the writer fails.
    pub async fn download<W>(
        &self,
        path: &str,
        writer: &mut W,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<DownloadOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        let query = ActionQuery::download();
        self.limiters.for_class(query.verb().class()).acquire().await;
        self.download_stream_once(path, &query, writer, options, on_progress)
            .await
    }

    /// Downloads a remote file to a local path, retrying transient failures
    /// by truncating and rewriting the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be written, the request
    /// fails, or the server answers non-2xx.
    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<DownloadOutcome> {
        let query = ActionQuery::download();
        let limiter = self.limiters.for_class(query.verb().class());
        let cancel = options.cancel.clone();
        let operation = format!("download {remote_path}");

        self.retry
            .execute(
                &operation,
                cancel.as_ref(),
                || limiter.acquire(),
                NetStorageError::is_retryable,
                || {
                    let query = query.clone();
                    let on_progress = on_progress.clone();
                    async move {
                        let mut file = tokio::fs::File::create(local_path).await?;
                        let outcome = self
                            .download_stream_once(
                                remote_path,
                                &query,
                                &mut file,
                                options,
                                on_progress,
                            )
                            .await?;
                        file.sync_all().await?;
                        Ok(outcome)
                    }
                },
            )
            .await
    }

    async fn download_stream_once<W>(
        &self,
        path: &str,
        query: &ActionQuery,
        writer: &mut W,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<DownloadOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        let url = self.config.uri(path);
        let headers = self.build_headers(path, query)?;
        let timeout = options.effective_timeout(&self.config);
        let cancel = options.cancel.clone();

        tracing::debug!("GET {url} (streaming download)");
        let request = async {
            let response = self
                .client
                .get(url.as_str())
                .headers(headers)
                .send()
                .await
                .map_err(|e| NetStorageError::from_transport(&e, "GET", &url))?;

            let status = response.status().as_u16();
            if status >= 300 {
                let body = read_snippet(response).await;
                return Err(NetStorageError::Http {
                    status,
                    method: "GET".to_string(),
                    url,
                    body,
                });
            }

            let mut stream = response.bytes_stream();
            let mut total = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| NetStorageError::from_transport(&e, "GET", &url))?;
                writer.write_all(&chunk).await?;
                total += chunk.len() as u64;
                if let Some(progress) = &on_progress {
                    progress(total);
                }
            }
            writer.flush().await?;
            Ok((status, total))
        };

        let (status, total) = with_deadline(request, timeout, cancel.as_ref(), path).await?;
        Ok(DownloadOutcome {
            status: StatusDocument::from_http(status),
            bytes_transferred: total,
        })
    }

    // -------------------------------------------------------------------------------------------
    // Probes
    // -------------------------------------------------------------------------------------------

    /// Returns `true` when `stat` reports an entry at `path`.
    ///
    /// A 404 maps to `false`; every other error re-raises.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason other than 404.
    pub async fn file_exists(&self, path: &str, options: &RequestOptions) -> Result<bool> {
        match self.stat(path, options).await {
            Ok(response) => Ok(!response.entries.is_empty()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` when `path` names a regular file.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason other than 404.
    pub async fn is_file(&self, path: &str, options: &RequestOptions) -> Result<bool> {
        match self.stat(path, options).await {
            Ok(response) => Ok(response.file().is_some_and(|e| e.is_file())),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` when `path` names a directory, explicit or implicit.
    ///
    /// `stat` answers for explicit directories; implicit directories 404 on
    /// `stat` but report usage through `du`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason other than 404.
    pub async fn is_directory(&self, path: &str, options: &RequestOptions) -> Result<bool> {
        match self.stat(path, options).await {
            Ok(response) => Ok(response.file().is_some_and(|e| e.is_dir())),
            Err(e) if e.is_not_found() => match self.du(path, options).await {
                Ok(du) => Ok(du.info.is_some()),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Uploads `local_path` only when nothing exists at `remote_path`.
    ///
    /// When the destination already exists the outcome carries the skip
    /// status (`code == 0`) and no bytes are sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe or the upload fails.
    pub async fn upload_missing(
        &self,
        local_path: &Path,
        remote_path: &str,
        options: &RequestOptions,
        on_progress: Option<ProgressFn>,
    ) -> Result<UploadOutcome> {
        if self.file_exists(remote_path, options).await? {
            tracing::debug!("Skipping upload, {remote_path} already exists");
            return Ok(UploadOutcome {
                status: StatusDocument::skipped(),
                bytes_transferred: 0,
            });
        }
        self.upload_file(local_path, remote_path, options, on_progress)
            .await
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| NetStorageError::Internal(format!("invalid header value: {e}")))
}

/// Truncates an error body to the snippet cap on a char boundary.
fn truncate_snippet(mut body: String) -> String {
    if body.len() > ERROR_BODY_SNIPPET_MAX {
        let mut cut = ERROR_BODY_SNIPPET_MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Buffers the first bytes of an error response, up to the snippet cap.
async fn read_snippet(response: Response) -> String {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut stream = response.bytes_stream();
    while let Some(Ok(chunk)) = stream.next().await {
        buf.extend_from_slice(&chunk);
        if buf.len() >= ERROR_BODY_SNIPPET_MAX {
            buf.truncate(ERROR_BODY_SNIPPET_MAX);
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Runs `fut` under the resolved timeout and cancellation signal.
async fn with_deadline<T>(
    fut: impl std::future::Future<Output = Result<T>>,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
    what: &str,
) -> Result<T> {
    let deadline = async {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(NetStorageError::timeout(format!(
                "{what} exceeded {timeout:?}"
            ))),
        }
    };
    match cancel {
        Some(token) => {
            tokio::select! {
                () = token.cancelled() => Err(NetStorageError::aborted(format!("{what} canceled"))),
                result = deadline => result,
            }
        }
        None => deadline.await,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn client() -> NetStorageClient {
        let config = NetStorageConfig::new(
            "secret".to_string(),
            "alice".to_string(),
            "h.example".to_string(),
        )
        .unwrap();
        NetStorageClient::new(config).unwrap()
    }

    #[rstest]
    fn test_build_headers_triple() {
        let client = client();
        let query = ActionQuery::stat();
        let headers = client.build_headers("/foo/bar", &query).unwrap();

        assert_eq!(
            headers.get("x-akamai-acs-action").unwrap(),
            "version=1&action=stat&format=xml"
        );
        let auth_data = headers
            .get("x-akamai-acs-auth-data")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(auth_data.starts_with("5, 0.0.0.0, 0.0.0.0, "));
        assert!(auth_data.ends_with(", alice"));
        assert!(headers.contains_key("x-akamai-acs-auth-sign"));
    }

    #[rstest]
    fn test_truncate_snippet_caps_and_respects_char_boundaries() {
        let long = "é".repeat(ERROR_BODY_SNIPPET_MAX);
        let truncated = truncate_snippet(long);
        assert!(truncated.len() <= ERROR_BODY_SNIPPET_MAX);
        assert!(truncated.chars().all(|c| c == 'é'));

        let short = truncate_snippet("ok".to_string());
        assert_eq!(short, "ok");
    }

    #[tokio::test]
    async fn test_set_mtime_rejects_invalid_instant() {
        let client = client();
        let result = client
            .set_mtime("/foo", i64::MAX, &RequestOptions::default())
            .await;
        assert!(matches!(result, Err(NetStorageError::NotADate { .. })));
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<()> = with_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(10),
            None,
            "test",
        )
        .await;
        assert!(matches!(
            result,
            Err(NetStorageError::Network {
                kind: crate::http::error::NetworkErrorKind::Timeout,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_with_deadline_cancel_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<()> = with_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_secs(10),
            Some(&token),
            "test",
        )
        .await;
        assert!(matches!(
            result,
            Err(NetStorageError::Network {
                kind: crate::http::error::NetworkErrorKind::Aborted,
                ..
            })
        ));
    }
}
