use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn user_agent() -> String {
    format!("kira-sl/{}", env!("CARGO_PKG_VERSION"))
}

/// Blocking client with the crate user agent and a per-request timeout.
pub fn blocking_client(timeout: Duration) -> Result<Client, String> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent()).map_err(|err| err.to_string())?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| err.to_string())
}

/// Splits a response into success or `(status, body)` for the caller's error
/// variant.
pub fn check_status(response: Response) -> Result<Response, (u16, String)> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "request failed".to_string());
    Err((status, message))
}
