//! Error types for the credit manager.

use thiserror::Error;

use crate::credit::ResourceId;
use crate::store::StoreError;

/// Main error type for credit manager operations.
#[derive(Error, Debug)]
pub enum CreditError {
    /// The resource was never registered, or has been unregistered.
    #[error("Resource {resource} is not registered with the credit manager")]
    NotRegistered { resource: ResourceId },

    /// A single spend asked for more than the resource's per-minute quota.
    #[error("Requested {requested} credits exceeds the quota of {quota} per minute")]
    QuotaExceeded { requested: i64, quota: i64 },

    /// Accumulation finished but the balance still cannot cover the request.
    #[error("Could not accumulate enough credits: requested {requested}, balance {balance}")]
    InsufficientCredits { requested: i64, balance: i64 },

    /// The deficit cannot be refilled within one replenishment window.
    #[error("Accumulation would take {required_secs}s, longer than the 60s window")]
    WindowExceeded { required_secs: i64 },

    /// Balance store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for credit manager operations.
pub type Result<T> = std::result::Result<T, CreditError>;
