//! Error responses.
//!
//! Every failure leaves the server as `{success: false, error, kind, ...details}` with a
//! status derived from [`ErrorKind`]. [`ErrorBody::into_error`] is the inverse used by
//! the HTTP client.

use crate::{
    core::identity::Role,
    entities::order::OrderStatus,
    errors::{Error, ErrorKind},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Variant-specific fields of an error body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Order the error refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    /// Authoritative status on a conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<OrderStatus>,
    /// Status the rejected request asked for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_status: Option<OrderStatus>,
    /// Client total on a mismatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<i64>,
    /// Server total on a mismatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<i64>,
    /// Rejected OTP input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// OTP candidates tried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Caller role on a forbidden action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// The forbidden action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`
    pub success: bool,
    /// Human-readable message
    pub error: String,
    /// Stable tag
    pub kind: ErrorKind,
    /// Variant fields
    #[serde(flatten)]
    pub details: ErrorDetails,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::TotalMismatch {
                submitted,
                computed,
            } => ErrorDetails {
                submitted: Some(*submitted),
                computed: Some(*computed),
                ..ErrorDetails::default()
            },
            Error::InvalidOtp { code } => ErrorDetails {
                code: Some(code.clone()),
                ..ErrorDetails::default()
            },
            Error::OtpCollisionExhausted { attempts } => ErrorDetails {
                attempts: Some(*attempts),
                ..ErrorDetails::default()
            },
            Error::OrderNotFound { id } => ErrorDetails {
                order_id: Some(*id),
                ..ErrorDetails::default()
            },
            Error::IllegalTransition {
                id,
                current,
                requested,
            } => ErrorDetails {
                order_id: Some(*id),
                current_status: Some(*current),
                requested_status: Some(*requested),
                ..ErrorDetails::default()
            },
            Error::Forbidden { role, action } => ErrorDetails {
                role: Some(*role),
                action: Some(action.clone()),
                ..ErrorDetails::default()
            },
            _ => ErrorDetails::default(),
        };

        // Internal failures are logged in full but not echoed to callers.
        let message = if err.kind() == ErrorKind::Internal {
            "internal server error".to_string()
        } else {
            err.to_string()
        };

        Self {
            success: false,
            error: message,
            kind: err.kind(),
            details,
        }
    }
}

impl ErrorBody {
    /// Rebuilds the server-side error from a response body and its HTTP status.
    pub fn into_error(self, status: u16) -> Error {
        let kind = self.kind;
        let d = self.details;
        let malformed = |what: &str| Error::MalformedResponse {
            message: format!("{kind:?} error without {what}"),
        };

        match kind {
            ErrorKind::Validation => Error::Validation {
                message: self.error,
            },
            ErrorKind::EmptyDraft => Error::EmptyDraft,
            ErrorKind::TotalMismatch => match (d.submitted, d.computed) {
                (Some(submitted), Some(computed)) => Error::TotalMismatch {
                    submitted,
                    computed,
                },
                _ => malformed("totals"),
            },
            ErrorKind::InvalidOtp => Error::InvalidOtp {
                code: d.code.unwrap_or_default(),
            },
            ErrorKind::OtpCollisionExhausted => Error::OtpCollisionExhausted {
                attempts: d.attempts.unwrap_or_default(),
            },
            ErrorKind::NotFound => d
                .order_id
                .map_or_else(|| malformed("order id"), |id| Error::OrderNotFound { id }),
            ErrorKind::Conflict => match (d.order_id, d.current_status, d.requested_status) {
                (Some(id), Some(current), Some(requested)) => Error::IllegalTransition {
                    id,
                    current,
                    requested,
                },
                _ => malformed("transition details"),
            },
            ErrorKind::Unauthenticated => Error::Unauthenticated,
            ErrorKind::Forbidden => Error::Forbidden {
                role: d.role.unwrap_or(Role::User),
                action: d.action.unwrap_or_default(),
            },
            ErrorKind::Internal => Error::Server {
                status,
                message: self.error,
            },
        }
    }
}

/// HTTP status for an error kind.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation
        | ErrorKind::EmptyDraft
        | ErrorKind::TotalMismatch
        | ErrorKind::InvalidOtp => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::OtpCollisionExhausted => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}
