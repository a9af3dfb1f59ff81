//! Core types and error definitions for the Recollect memory engine.
//!
//! This crate provides the foundational types shared across all Recollect
//! crates: error handling, the namespace key that partitions memories, and
//! the uniform result shape returned to callers of the memory service.
//!
//! # Main types
//!
//! - [`RecollectError`]: Unified error enum for all Recollect subsystems.
//! - [`RecollectResult`]: Convenience alias for `Result<T, RecollectError>`.
//! - [`Namespace`]: Opaque caller-supplied isolation key ("preset").
//! - [`OperationResult`]: Success flag, message, and payload of a service call.
//! - [`ErrorKind`]: Machine-readable label for failed or warned results.

use serde::{Deserialize, Serialize};
use std::fmt;

// --- Error types ---

/// Top-level error type for the Recollect engine.
#[derive(Debug, thiserror::Error)]
pub enum RecollectError {
    /// A store was rejected because the namespace is full and auto-cleanup is off.
    #[error("Capacity exceeded: namespace already holds {max_entries} entries")]
    CapacityExceeded {
        /// The configured capacity that was hit.
        max_entries: usize,
    },

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the durable backing of a namespace.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecollectError {
    /// The [`ErrorKind`] reported to callers for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Config(_) => ErrorKind::InvalidConfig,
            Self::Storage(_) | Self::Json(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }
}

/// A convenience `Result` alias using [`RecollectError`].
pub type RecollectResult<T> = Result<T, RecollectError>;

// --- Namespace ---

/// Isolation unit for memories, vocabulary statistics, and capacity limits.
///
/// The key is opaque: any string the caller chooses, including the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a namespace from any string-like key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Namespace {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// --- Operation results ---

/// Machine-readable label attached to failed or warned results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Namespace full and auto-cleanup disabled.
    CapacityExceeded,
    /// Text normalized to zero tokens. Reported on a successful store.
    EmptyInput,
    /// Configuration failed validation.
    InvalidConfig,
    /// The durable backend failed; nothing was changed.
    Storage,
}

/// Uniform result shape returned by every memory service operation.
///
/// Expected conditions (empty namespace, no matches, capacity exceeded) are
/// reported here rather than as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    /// Whether the operation took effect.
    pub success: bool,
    /// Human-readable description of the outcome.
    pub message: String,
    /// Set when the operation failed, or succeeded with a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Operation-specific payload; present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> OperationResult<T> {
    /// Creates a successful result carrying a payload.
    pub fn success(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: None,
            payload: Some(payload),
        }
    }

    /// Creates a successful result that also carries a warning kind.
    pub fn warning(message: impl Into<String>, kind: ErrorKind, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: Some(kind),
            payload: Some(payload),
        }
    }

    /// Creates a failed result.
    pub fn failure(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            success: false,
            message: message.into(),
            kind: Some(kind),
            payload: None,
        }
    }

    /// Converts an error into a failed result, using its display text as the message.
    pub fn from_error(err: &RecollectError) -> Self {
        Self::failure(err.to_string(), err.kind())
    }

    /// Maps the payload, keeping flag, message, and kind.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            message: self.message,
            kind: self.kind,
            payload: self.payload.map(f),
        }
    }
}
