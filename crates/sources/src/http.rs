//! Status and transport error mapping shared by the HTTP adapters.

use std::time::Duration;

use pipeline::CallError;
use reqwest::header::RETRY_AFTER;
use reqwest::Response;

const MAX_ERROR_BODY: usize = 512;

pub(crate) fn client(service: &'static str, timeout: Duration) -> Result<reqwest::Client, CallError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (compatible; newsdesk)")
        .build()
        .map_err(|e| transport_error(service, e))
}

pub(crate) fn transport_error(service: &'static str, error: reqwest::Error) -> CallError {
    if error.is_timeout() {
        CallError::Timeout { service }
    } else {
        CallError::Transport {
            service,
            message: error.to_string(),
        }
    }
}

/// Passes successful responses through; turns anything else into [`CallError::Status`].
pub(crate) async fn check_status(
    service: &'static str,
    response: Response,
) -> Result<Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    Err(CallError::Status {
        service,
        status: status.as_u16(),
        message: body.trim().chars().take(MAX_ERROR_BODY).collect(),
        retry_after,
    })
}
