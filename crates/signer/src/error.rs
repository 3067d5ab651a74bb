use std::fmt;
use std::io;
use std::time::Duration;

use axum::http::StatusCode;
use axum_core::response::{IntoResponse as AxumCoreIntoResponse, Response};

/// Required request field that was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Content,
    Key,
    Certificate,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputField::Content => "content",
            InputField::Key => "key",
            InputField::Certificate => "certificate",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// Rejected before any process was started.
    #[error("Invalid {0}")]
    InvalidInput(InputField),
    #[error("Failed to start signing tool: {0}")]
    Spawn(#[source] io::Error),
    /// The tool exited unsuccessfully; its stdout was discarded.
    #[error("Process failed ({})", exit_code_label(.code))]
    ProcessFailed { code: Option<i32>, stderr: String },
    #[error("Content stream failed: {0}")]
    Stream(#[source] io::Error),
    #[error("I/O error while talking to signing tool: {0}")]
    Io(#[source] io::Error),
    #[error("Signing tool did not finish within {0:?}")]
    Timeout(Duration),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Signing(#[from] SignError),
}

/// Trait implementation to convert this error into an axum http response
impl AxumCoreIntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            bad_request @ ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, bad_request.to_string()).into_response()
            }
            ServerError::Signing(
                err @ (SignError::InvalidInput(_) | SignError::Stream(_)),
            ) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
            ServerError::Signing(err @ SignError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, err.to_string()).into_response()
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something wrong happened.",
            )
                .into_response(),
        }
    }
}
