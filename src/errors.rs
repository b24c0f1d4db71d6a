//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors carry a stable
//! [`ErrorKind`] tag so the API layer can put it on the wire and the HTTP client
//! can turn it back into the same variant.

use crate::{core::identity::Role, entities::order::OrderStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Persistence layer failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure (draft persistence, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or unreadable environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network failure talking to the order service
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A request was rejected before reaching persistence
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Submission attempted with no items in the cart
    #[error("Cannot place an order with an empty cart")]
    EmptyDraft,

    /// Submitted total disagrees with the total computed from the snapshot
    #[error("Order total {submitted} does not match computed total {computed}")]
    TotalMismatch {
        /// Total sent by the client
        submitted: i64,
        /// Total computed from the submitted files and settings
        computed: i64,
    },

    /// OTP input is not a 4-digit code
    #[error("Invalid OTP '{code}': expected 4 digits")]
    InvalidOtp {
        /// The rejected input
        code: String,
    },

    /// Every candidate OTP collided with an active order
    #[error("Could not issue a unique OTP after {attempts} attempts")]
    OtpCollisionExhausted {
        /// Number of candidates tried
        attempts: u32,
    },

    /// No order with this id is visible to the caller
    #[error("Order {id} not found")]
    OrderNotFound {
        /// Requested order id
        id: i64,
    },

    /// The order's current status does not allow the requested transition
    #[error("Order {id} is {current}, cannot move to {requested}; state changed, please refresh")]
    IllegalTransition {
        /// Order id
        id: i64,
        /// Authoritative status at the time of the request
        current: OrderStatus,
        /// Status the caller asked for
        requested: OrderStatus,
    },

    /// No session identity was supplied
    #[error("Authentication required")]
    Unauthenticated,

    /// The caller's role may not perform this action
    #[error("Role '{role}' is not allowed to {action}")]
    Forbidden {
        /// Role of the caller
        role: Role,
        /// The attempted action
        action: String,
    },

    /// A bounded request did not finish in time; its outcome is unknown
    #[error("{operation} timed out; outcome unknown")]
    Timeout {
        /// Operation that timed out
        operation: String,
    },

    /// The server answered with a payload that does not match the contract
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// What failed to decode
        message: String,
    },

    /// The server reported a failure it did not classify further
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message from the error body
        message: String,
    },
}

/// Stable wire tag for [`Error`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, rejected before persistence
    Validation,
    /// Empty cart
    EmptyDraft,
    /// Client total disagrees with server pricing
    TotalMismatch,
    /// Malformed OTP
    InvalidOtp,
    /// OTP issuance gave up
    OtpCollisionExhausted,
    /// Missing order
    NotFound,
    /// Illegal or stale transition
    Conflict,
    /// Missing identity
    Unauthenticated,
    /// Wrong role
    Forbidden,
    /// Persistence, I/O or other internal failure
    Internal,
}

impl Error {
    /// Wire tag for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Serialization(_) => ErrorKind::Validation,
            Self::EmptyDraft => ErrorKind::EmptyDraft,
            Self::TotalMismatch { .. } => ErrorKind::TotalMismatch,
            Self::InvalidOtp { .. } => ErrorKind::InvalidOtp,
            Self::OtpCollisionExhausted { .. } => ErrorKind::OtpCollisionExhausted,
            Self::OrderNotFound { .. } => ErrorKind::NotFound,
            Self::IllegalTransition { .. } => ErrorKind::Conflict,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Transport(_)
            | Self::Timeout { .. }
            | Self::MalformedResponse { .. }
            | Self::Server { .. } => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Transport(_)
                | Self::Timeout { .. }
                | Self::Server { .. }
                | Self::OtpCollisionExhausted { .. }
        )
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
