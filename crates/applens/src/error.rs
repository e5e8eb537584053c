use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppLensError {
    #[error("AppLens request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode AppLens response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("AppLens returned status {status}: {message}")]
    Response {
        status: u16,
        error_code: Option<String>,
        message: String,
        raw: String,
    },

    #[error("Invalid AppLens request header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("AppLens client configuration error: {message}")]
    ConfigError { message: String },
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<Box<ErrorBody>>,
}

impl AppLensError {
    /// Build a `Response` error from a non-success status and its body
    pub fn from_status(status: u16, raw: String) -> Self {
        let body = serde_json::from_str::<ErrorBody>(&raw).unwrap_or_default();
        let detail = match body.error {
            Some(inner) => *inner,
            None => body,
        };

        let message = detail
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    reqwest::StatusCode::from_u16(status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    raw.clone()
                }
            });

        AppLensError::Response {
            status,
            error_code: detail.code,
            message,
            raw,
        }
    }

    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        Self::from_status(status, raw)
    }

    /// HTTP status for `Response` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            AppLensError::Response { status, .. } => Some(*status),
            AppLensError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
