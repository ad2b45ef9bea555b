//! # Error Handling
//!
//! Error types for Warden Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Validation            - Bad input shape or range (100)            │
//! │  ├── PermissionDenied      - Invoker is not staff (200)                │
//! │  ├── TargetNotFound        - Member/channel unresolvable (300)         │
//! │  ├── AlreadyExists         - Duplicate resource, e.g. ticket (400)     │
//! │  ├── ExternalActionFailed  - Platform rejected the command (500)       │
//! │  ├── Persistence           - Store read/write failure (600)            │
//! │  ├── Serialization         - JSON encode/decode failure (601)          │
//! │  └── Internal              - Should not happen (900)                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Best-effort failures (notification sends, transcript delivery, notice
//! cleanup) are deliberately absent from this enum. They never reach an
//! invoker; see [`crate::tasks`].
//!
//! ## Propagation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Component                 EventRouter                  Invoker        │
//! │  ──────────────────────────────────────────────────────────────────     │
//! │                                                                         │
//! │  Result<T, Error>  ──────►  one terminal reply  ──────►  "❌ ..."      │
//! │                             (success XOR error)                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::platform::PlatformError;

/// Result type alias for Warden Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Warden Core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad input shape or range. Nothing was mutated.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The invoking member lacks staff capability. Nothing was mutated.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A referenced member or channel could not be resolved.
    #[error("Not found: {0}")]
    TargetNotFound(String),

    /// The resource already exists; `reference` points at the existing one.
    #[error("{what} already exists: {reference}")]
    AlreadyExists {
        /// Kind of resource (e.g. "ticket")
        what: String,
        /// Identifier of the existing resource
        reference: String,
    },

    /// The chat platform rejected the command.
    #[error("Action failed: {0}")]
    ExternalActionFailed(String),

    /// Store read or write failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric error code, grouped by category.
    ///
    /// - 100-199: Validation
    /// - 200-299: Permission
    /// - 300-399: Lookup
    /// - 400-499: Conflict
    /// - 500-599: External platform
    /// - 600-699: Persistence
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::Validation(_) => 100,
            Error::PermissionDenied(_) => 200,
            Error::TargetNotFound(_) => 300,
            Error::AlreadyExists { .. } => 400,
            Error::ExternalActionFailed(_) => 500,
            Error::Persistence(_) => 600,
            Error::Serialization(_) => 601,
            Error::Internal(_) => 900,
        }
    }

    /// Whether the failure was caused by the invoker's input or rights,
    /// as opposed to the platform or the process.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::PermissionDenied(_)
                | Error::TargetNotFound(_)
                | Error::AlreadyExists { .. }
        )
    }

    /// Text shown to the invoker of a command.
    pub fn user_message(&self) -> String {
        match self {
            Error::AlreadyExists { what, reference } if what == "ticket" => {
                format!("❌ You already have an open ticket: <#{}>", reference)
            }
            Error::Persistence(_) | Error::Serialization(_) | Error::Internal(_) => {
                "❌ Something went wrong while saving. Please try again.".to_string()
            }
            other => format!("❌ {}", other),
        }
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

impl From<PlatformError> for Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(what) => Error::TargetNotFound(what),
            PlatformError::Rejected(reason) => Error::ExternalActionFailed(reason),
            PlatformError::Transport(reason) => Error::ExternalActionFailed(reason),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
