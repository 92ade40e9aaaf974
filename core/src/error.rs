//! Error types for the command client.
//!
//! # Design
//! Four families are kept apart so callers can tell where a call failed:
//! contract violations raised before any I/O (`MissingParameter`,
//! `UnexpectedArgument`, `InvalidOption`, `Filter`), transport failures
//! (`Transport`), HTTP application errors resolved by a `Fallback`
//! (`BadRequest`, `Forbidden`, `NotFound`, `Conflict`, `Http`), and body
//! shape errors (`Parse`). The remaining variants belong to the pending
//! result wrapper and to job polling.

use thiserror::Error;

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required positional argument was not supplied.
    #[error("{command}: missing required parameter `{name}`")]
    MissingParameter { command: &'static str, name: &'static str },

    /// More positional arguments than the operation declares.
    #[error("{command}: expected at most {expected} arguments, got {got}")]
    UnexpectedArgument {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    /// An options object contributed a parameter that cannot be sent.
    #[error("{command}: invalid option: {reason}")]
    InvalidOption { command: &'static str, reason: String },

    /// A request filter refused the request; nothing was sent.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The request never produced an HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 400
    #[error("bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// 401 or 403
    #[error("forbidden ({status}): {message}")]
    Forbidden { status: u16, message: String },

    /// 404
    #[error("not found ({status}): {message}")]
    NotFound { status: u16, message: String },

    /// 409
    #[error("conflict ({status}): {message}")]
    Conflict { status: u16, message: String },

    /// Any other non-2xx status, passed through unchanged.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The body did not match the operation's declared envelope.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("request was cancelled")]
    Cancelled,

    #[error("timed out waiting for result")]
    Timeout,

    /// `get` was already called on this pending result.
    #[error("result was already taken")]
    ResultTaken,

    #[error("background task failed: {0}")]
    TaskFailed(String),

    #[error("job {jobid} did not complete within the polling budget")]
    JobTimeout { jobid: String },

    #[error("job {jobid} failed ({code}): {text}")]
    JobFailed { jobid: String, code: i64, text: String },
}

impl ApiError {
    /// Status code for HTTP application errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest { status, .. }
            | ApiError::Forbidden { status, .. }
            | ApiError::NotFound { status, .. }
            | ApiError::Conflict { status, .. }
            | ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Network-level failures. Never mapped to HTTP error kinds.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Asynchronous dispatch was requested outside a Tokio runtime.
    #[error("no async runtime available for dispatch")]
    NoRuntime,
}

/// Response body did not have the expected shape.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected envelope: {0}")]
    Shape(String),
}

/// A filter could not process the request.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("no credentials configured for signing")]
    MissingCredential,

    #[error("request cannot be signed: {0}")]
    InvalidRequest(String),
}

/// Result type for client operations.
pub type ApiResult<T> = Result<T, ApiError>;
