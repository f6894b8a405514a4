//! `Transport` over HTTP using a blocking reqwest client

use crate::error::{Result, TransferError};
use crate::transport::{
    AppendRequest, AppendResponse, MasterReply, SessionReply, SessionRequest, Transport,
};
use common::headers::{
    FILENAME, FILETYPE, ID, MAX_REQUEST_SIZE, OFFSET, REQUEST_TYPE, REQUEST_TYPE_APPEND,
    REQUEST_TYPE_INIT,
};
use common::parse_u64_header;
use log::warn;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{default_on_request_failure, RetryDecision, RetryPolicy, Retryable};
use std::thread;
use std::time::{Duration, SystemTime};

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;

/// Connection settings for [`HttpTransport`]
#[derive(Clone, Debug)]
pub struct HttpOptions {
    /// Timeout of a whole request, body included
    pub request_timeout: Duration,
    /// Extra attempts for a request that failed with a transient error
    pub request_retries: u32,
    /// Upper bound of the pause between those attempts
    pub request_retry_wait: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(300),
            request_retries: 3,
            request_retry_wait: Duration::from_secs(10),
        }
    }
}

pub struct HttpTransport {
    client: Client,
    retry_policy: ExponentialBackoff,
}

impl HttpTransport {
    pub fn new(options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| TransferError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(options.request_retry_wait, options.request_retry_wait)
            .build_with_max_retries(options.request_retries);
        Ok(Self {
            client,
            retry_policy,
        })
    }

    /// Send the request built by `build`, resending it while the failure is
    /// transient and the policy allows. Any response, whatever its status, is
    /// returned to the caller.
    fn send(&self, url: &str, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response> {
        let start_time = SystemTime::now();
        let mut past_retries = 0;
        loop {
            let error = match build(&self.client).send() {
                Ok(response) => return Ok(response),
                Err(e) => e.into(),
            };
            let failed =
                || TransferError::Transport(format!("Failed to connect to {}: {}", url, error));

            let Some(Retryable::Transient) = default_on_request_failure(&error) else {
                return Err(failed());
            };

            match self.retry_policy.should_retry(start_time, past_retries) {
                RetryDecision::Retry { execute_after } => {
                    past_retries += 1;
                    warn!("Request to {} failed ({}), retry {}", url, error, past_retries);
                    if let Ok(wait) = execute_after.duration_since(SystemTime::now()) {
                        thread::sleep(wait);
                    }
                }
                RetryDecision::DoNotRetry => return Err(failed()),
            }
        }
    }
}

/// Correction headers only mean something on a refused append
fn is_correction_status(status: u16) -> bool {
    !matches!(status, STATUS_OK | STATUS_CREATED)
}

fn optional_u64(headers: &HeaderMap, name: &'static str) -> Result<Option<u64>> {
    match headers.get(name) {
        Some(value) if !value.is_empty() => Ok(Some(parse_u64_header(name, value.as_bytes())?)),
        _ => Ok(None),
    }
}

impl Transport for HttpTransport {
    fn fetch_upload_address(&self, master: &str) -> Result<MasterReply> {
        let response = self.send(master, |client| client.get(master))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| {
            TransferError::Transport(format!("Failed to read reply from {}: {}", master, e))
        })?;
        Ok(MasterReply { status, body })
    }

    fn open_session(
        &self,
        upload_address: &str,
        request: &SessionRequest<'_>,
    ) -> Result<SessionReply> {
        let response = self.send(upload_address, |client| {
            let mut builder = client
                .post(upload_address)
                .header(REQUEST_TYPE, REQUEST_TYPE_INIT)
                .header(FILENAME, request.file_name)
                .header(FILETYPE, request.kind.as_str());
            for (name, value) in request.sizes.to_header_pairs() {
                builder = builder.header(name, value);
            }
            builder
        })?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let session_id = headers
            .get(ID)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let max_request_size = optional_u64(headers, MAX_REQUEST_SIZE)?;
        let body = response.text().unwrap_or_default();

        Ok(SessionReply {
            status,
            session_id,
            max_request_size,
            body,
        })
    }

    fn append(&self, upload_address: &str, request: &AppendRequest<'_>) -> Result<AppendResponse> {
        let offset = request.offset.to_string();
        let response = self.send(upload_address, |client| {
            client
                .post(upload_address)
                .header(REQUEST_TYPE, REQUEST_TYPE_APPEND)
                .header(ID, request.session_id)
                .header(OFFSET, offset.as_str())
                .body(request.chunk.to_vec())
        })?;

        let status = response.status().as_u16();
        if !is_correction_status(status) {
            return Ok(AppendResponse {
                status,
                ..Default::default()
            });
        }

        let headers = response.headers();
        Ok(AppendResponse {
            status,
            offset: optional_u64(headers, OFFSET)?,
            max_request_size: optional_u64(headers, MAX_REQUEST_SIZE)?,
        })
    }
}
