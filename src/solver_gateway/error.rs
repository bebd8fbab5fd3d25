use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UpstreamUnavailable,
    UpstreamTimeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated field. `field` uses the client-facing spelling, with `.` for
/// nested members and `[i]` for sequence positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldViolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            upstream_status: None,
        }
    }

    pub fn with_details(mut self, details: Vec<FieldViolation>) -> Self {
        self.details = details;
        self
    }

    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)?;
        if let Some(status) = self.upstream_status {
            write!(f, " [upstream_status={}]", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

pub fn validation_failed(details: Vec<FieldViolation>) -> ClassifiedError {
    let message = match details.len() {
        1 => "request validation failed: 1 field is invalid".to_string(),
        n => format!("request validation failed: {} fields are invalid", n),
    };
    ClassifiedError::new(ErrorKind::Validation, message).with_details(details)
}

pub fn upstream_unavailable(message: impl Into<String>) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::UpstreamUnavailable, message)
}

pub fn upstream_timeout(message: impl Into<String>) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::UpstreamTimeout, message)
}

pub fn internal_error(message: impl Into<String>) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Internal, message)
}
