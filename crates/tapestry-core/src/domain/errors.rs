//! Errors - tracking-model misuse and wrapped domain errors.
//!
//! Two different things live here:
//! - [`TrackingError`]: returned by tracking operations when the caller breaks
//!   the API contract. These are defects, never retried.
//! - [`ErrorObject`]: opaque payload attached to a failed node. The tracking
//!   model stores and bubbles it but never interprets it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Misuse of the tracking API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// Malformed input (empty name, unrecognized type, missing error payload).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Mutation that breaks the status state machine.
    #[error("invalid state: {message}")]
    InvalidState { message: String },
}

impl TrackingError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

/// Structured error attached to a FAILURE/ERROR node.
///
/// Shape: `{ "message": ..., "cause": { ... }?, "detail": ...? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorObject>>,

    /// Arbitrary structured context (exit code, response body, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ErrorObject {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            detail: None,
        }
    }

    /// Wrap a native error, flattening its `source()` chain into nested causes.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            chain.push(e.to_string());
            current = e.source();
        }

        let mut wrapped: Option<ErrorObject> = None;
        for message in chain.into_iter().rev() {
            wrapped = Some(ErrorObject {
                message,
                cause: wrapped.map(Box::new),
                detail: None,
            });
        }
        wrapped.unwrap_or_else(|| ErrorObject::new(String::new()))
    }

    pub fn with_cause(mut self, cause: ErrorObject) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attach structured detail. A JSON `null` is the same as no detail.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail).filter(|d| !d.is_null());
        self
    }

    /// The innermost cause (or `self` when there is none).
    pub fn root_cause(&self) -> &ErrorObject {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Iterate this error followed by each nested cause.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorObject> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl From<&str> for ErrorObject {
    fn from(message: &str) -> Self {
        ErrorObject::new(message)
    }
}

impl From<String> for ErrorObject {
    fn from(message: String) -> Self {
        ErrorObject::new(message)
    }
}
