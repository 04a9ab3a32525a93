//! Shared POST-JSON transport with per-call deadline.

use std::time::Duration;

use serde_json::Value;

use super::base::VendorRequest;
use crate::types::errors::ProviderErrorKind;

/// Why a call produced no usable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl CallFailure {
    fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Sends one POST and returns the parsed 2xx body.
///
/// The deadline covers connect, send and the full body read; on expiry the
/// in-flight request is dropped and a timeout failure is returned.
pub async fn post_json(
    http: &reqwest::Client,
    request: VendorRequest,
    timeout: Duration,
) -> Result<Value, CallFailure> {
    let response = http
        .post(request.url)
        .headers(request.headers)
        .json(&request.body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify(e, timeout))?;

    let status = response.status();
    let text = response.text().await.map_err(|e| classify(e, timeout))?;

    if !status.is_success() {
        return Err(CallFailure::new(
            ProviderErrorKind::Transport,
            upstream_message(status.as_u16(), &text),
        ));
    }

    serde_json::from_str(&text).map_err(|e| {
        CallFailure::new(
            ProviderErrorKind::Shape,
            format!("upstream returned invalid JSON: {}", e),
        )
    })
}

fn classify(err: reqwest::Error, timeout: Duration) -> CallFailure {
    if err.is_timeout() {
        CallFailure::new(
            ProviderErrorKind::Timeout,
            format!("timeout after {}ms", timeout.as_millis()),
        )
    } else if err.is_connect() {
        CallFailure::new(
            ProviderErrorKind::Transport,
            format!("connection failed: {}", err),
        )
    } else {
        CallFailure::new(ProviderErrorKind::Transport, err.to_string())
    }
}

/// Error text for a non-2xx reply: the vendor's `error.message`, else the raw
/// body, else `upstream_error_<status>`.
pub fn upstream_message(status: u16, body: &str) -> String {
    let vendor_message = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        match v.get("error") {
            Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str).map(str::to_string),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    });

    match vendor_message {
        Some(message) if !message.is_empty() => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("upstream_error_{}", status),
    }
}
