//! Error types and result definitions for the rusonoff crate.
//! Covers cloud/LAN call failures, UIID validation errors and conversions from IO/JSON errors.

use std::fmt;
use thiserror::Error;

const BODY_PREVIEW_LEN: usize = 256;

/// Request/response details attached to a failed call for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    pub method: String,
    pub url: String,
    pub request_body: Option<String>,
    pub status: Option<u16>,
    pub response_body: Option<String>,
}

impl CallContext {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn with_response(mut self, status: u16, body: impl Into<String>) -> Self {
        self.status = Some(status);
        self.response_body = Some(body.into());
        self
    }

    /// One-line summary with the response body cut to a log friendly length.
    pub fn summary(&self) -> String {
        let body = self
            .response_body
            .as_deref()
            .map(truncate_body)
            .unwrap_or_default();
        match self.status {
            Some(status) => format!("{} {} -> {} {}", self.method, self.url, status, body),
            None => format!("{} {}", self.method, self.url),
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_LEN {
        return body.to_string();
    }
    let cut: String = body.chars().take(BODY_PREVIEW_LEN).collect();
    format!("{}...", cut)
}

/// A UIID payload field that violated its declared constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Wire name of the offending field (nested fields use `parent.child`)
    pub field: String,
    /// Expected kind, e.g. "integer", "enum"
    pub expected: &'static str,
    /// Human readable constraint, e.g. "min 0, max 100"
    pub constraint: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' expected {} ({})",
            self.field, self.expected, self.constraint
        )
    }
}

/// Represents all possible errors of the Sonoff cloud and LAN clients.
#[derive(Error, Debug, Clone)]
pub enum SonoffError {
    /// Cloud REST call failed (transport, HTTP status or non-zero `error` field)
    #[error("Cloud API call failed: {message}")]
    CloudApiCall {
        message: String,
        code: Option<i64>,
        context: Option<Box<CallContext>>,
    },

    /// Cloud WebSocket call failed or the server replied with an error
    #[error("Cloud sockets call failed: {message}")]
    CloudWsCall { message: String, code: Option<i64> },

    /// Device local API call failed
    #[error("LAN API call failed: {message}")]
    LanApiCall {
        message: String,
        code: Option<i64>,
        context: Option<Box<CallContext>>,
    },

    /// UIID payload field out of its declared bounds
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// Response body did not match the expected schema
    #[error("Schema '{schema}' mismatch: {reason}")]
    Schema { schema: &'static str, reason: String },

    /// No reply received within the deadline
    #[error("Timeout waiting for reply")]
    Timeout,

    /// Operation attempted before its precondition was met
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed request construction
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Standard IO error
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// Failed to decode base64 or binary data
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Failed to encrypt a LAN payload
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Failed to decrypt a LAN payload (wrong key or iv)
    #[error("Decryption failed")]
    DecryptionFailed,
}

/// A specialized Result type for Sonoff operations.
pub type Result<T> = std::result::Result<T, SonoffError>;

impl From<std::io::Error> for SonoffError {
    fn from(err: std::io::Error) -> Self {
        SonoffError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SonoffError {
    fn from(err: serde_json::Error) -> Self {
        SonoffError::Json(err.to_string())
    }
}

impl From<ValidationError> for SonoffError {
    fn from(err: ValidationError) -> Self {
        SonoffError::Validation(err)
    }
}

impl SonoffError {
    pub fn cloud_api(message: impl Into<String>) -> Self {
        SonoffError::CloudApiCall {
            message: message.into(),
            code: None,
            context: None,
        }
    }

    pub fn cloud_ws(message: impl Into<String>) -> Self {
        SonoffError::CloudWsCall {
            message: message.into(),
            code: None,
        }
    }

    pub fn lan_api(message: impl Into<String>) -> Self {
        SonoffError::LanApiCall {
            message: message.into(),
            code: None,
            context: None,
        }
    }

    /// Attaches a server or HTTP code to a call failure. Other variants are returned unchanged.
    pub fn with_code(self, code: i64) -> Self {
        match self {
            SonoffError::CloudApiCall {
                message, context, ..
            } => SonoffError::CloudApiCall {
                message,
                code: Some(code),
                context,
            },
            SonoffError::CloudWsCall { message, .. } => SonoffError::CloudWsCall {
                message,
                code: Some(code),
            },
            SonoffError::LanApiCall {
                message, context, ..
            } => SonoffError::LanApiCall {
                message,
                code: Some(code),
                context,
            },
            other => other,
        }
    }

    /// Attaches request/response details to a REST call failure.
    pub fn with_context(self, ctx: CallContext) -> Self {
        match self {
            SonoffError::CloudApiCall { message, code, .. } => SonoffError::CloudApiCall {
                message,
                code,
                context: Some(Box::new(ctx)),
            },
            SonoffError::LanApiCall { message, code, .. } => SonoffError::LanApiCall {
                message,
                code,
                context: Some(Box::new(ctx)),
            },
            other => other,
        }
    }

    /// Server or HTTP error code, when one is known.
    pub fn code(&self) -> Option<i64> {
        match self {
            SonoffError::CloudApiCall { code, .. }
            | SonoffError::CloudWsCall { code, .. }
            | SonoffError::LanApiCall { code, .. } => *code,
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&CallContext> {
        match self {
            SonoffError::CloudApiCall { context, .. } | SonoffError::LanApiCall { context, .. } => {
                context.as_deref()
            }
            _ => None,
        }
    }

    /// True for LAN error codes after which the device should not be polled locally again.
    pub fn is_device_fatal(&self) -> bool {
        matches!(
            self,
            SonoffError::LanApiCall { code: Some(c), .. }
                if matches!(*c, ERR_LAN_INVALID_JSON | ERR_LAN_UNAUTHORIZED | ERR_LAN_DEVICE_ID_INVALID | ERR_LAN_INVALID_PARAMETER)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SonoffError::Timeout)
    }
}

// eWeLink response codes
define_error_codes! {
    ERR_SUCCESS = 0 => "Success",
    ERR_LAN_INVALID_JSON = 400 => "Device rejected the request body as invalid JSON",
    ERR_LAN_UNAUTHORIZED = 401 => "Device rejected the request as unauthorized",
    ERR_LAN_DEVICE_ID_INVALID = 404 => "Device ID is invalid",
    ERR_LAN_INVALID_PARAMETER = 422 => "Device rejected a request parameter",
    ERR_CLOUD_WRONG_REGION = 10004 => "Account belongs to another region",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lan_fatal_codes() {
        let err = SonoffError::lan_api("Reading device info failed").with_code(401);
        assert!(err.is_device_fatal());
        assert_eq!(err.code(), Some(401));

        let err = SonoffError::lan_api("Setting device state failed").with_code(500);
        assert!(!err.is_device_fatal());
        assert!(!SonoffError::Timeout.is_device_fatal());
    }

    #[test]
    fn context_summary_truncates_body() {
        let ctx = CallContext::new("POST", "https://eu-apia.coolkit.cc/v2/user/login")
            .with_response(500, "x".repeat(1000));
        let summary = ctx.summary();
        assert!(summary.starts_with("POST https://eu-apia.coolkit.cc/v2/user/login -> 500 "));
        assert!(summary.ends_with("..."));
        assert!(summary.len() < 400);
    }

    #[test]
    fn error_messages() {
        assert_eq!(get_error_message(ERR_CLOUD_WRONG_REGION), "Account belongs to another region");
        assert_eq!(get_error_message(12345), "Unknown error");
    }
}
