//! Error Module - Object Model Error Types
//!
//! Defines all error types used by the object model.
//!
//! # Error Categories
//!
//! ## Memory Errors
//! - `OutOfMemory` - Unmanaged allocation failed
//!
//! ## Transfer Errors
//! - `CorruptTuple` - Unrecognized tag byte in a tuple buffer
//! - `TruncatedTuple` - Tuple buffer ended mid-element
//!
//! ## Misuse Errors
//! - `NotRegistered` - Identifier unknown or already consumed
//! - `KindMismatch` - Handle resolved to an unexpected object kind
//!
//! ## Blocking Operation Outcomes
//! - `Interrupted` - A blocked queue operation was woken by an interrupt
//! - `QueueClosed` - The queue was terminated
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration
//! - `InvalidArgument` - Invalid function argument
//! - `Internal` - Invariant violation

use crate::kind::Kind;
use thiserror::Error;

/// Main error type for all object model operations
///
/// # Examples
///
/// ```rust
/// use lom::error::LomError;
///
/// fn handle_error(err: LomError) {
///     match err {
///         LomError::OutOfMemory { requested } => {
///             eprintln!("OOM: requested {} bytes", requested);
///         }
///         LomError::NotRegistered { identifier } => {
///             eprintln!("unknown identifier: {}", identifier);
///         }
///         _ => {
///             eprintln!("other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum LomError {
    /// Out of memory - unmanaged allocation failed
    ///
    /// **When returned:** Promoting a record or growing a tuple buffer could
    /// not obtain memory outside the managed pools
    ///
    /// **Recovery strategy:** Surface to the caller as a failure value; the
    /// managed side stays intact
    #[error("Out of memory: requested {requested} bytes of unmanaged memory")]
    OutOfMemory { requested: usize },

    /// Unrecognized tag byte in a tuple buffer
    ///
    /// **When returned:** Decoding hit a tag byte that is not part of the
    /// encoding. Subsequent offsets cannot be trusted, so the decode aborts.
    ///
    /// **Recovery strategy:** Abandon this transfer; `decoded` reports how
    /// many elements were recovered before the corruption
    #[error("Corrupt tuple: unrecognized tag {tag:#04x} after {decoded} decoded element(s)")]
    CorruptTuple { tag: u8, decoded: usize },

    /// Tuple buffer ended in the middle of an element
    ///
    /// **When returned:** The buffer is shorter than its header and tag
    /// stream claim
    ///
    /// **Recovery strategy:** Abandon this transfer; `decoded` reports how
    /// many elements were recovered before the truncation
    #[error("Truncated tuple: buffer exhausted after {decoded} decoded element(s)")]
    TruncatedTuple { decoded: usize },

    /// Identifier is not registered
    ///
    /// **When returned:** Dereferencing an identifier that was never
    /// registered, or that was already consumed by an earlier deref
    ///
    /// **Recovery strategy:** Report to the caller as an argument error
    #[error("Identifier not registered: {identifier}")]
    NotRegistered { identifier: String },

    /// Handle resolved to an unexpected object kind
    ///
    /// **When returned:** A wrapper expected one resource kind and the
    /// resolved root carries another
    ///
    /// **Recovery strategy:** Report to the caller as a value error
    #[error("Kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: Kind, actual: Kind },

    /// Blocked queue operation woken by an interrupt
    ///
    /// **When returned:** `interrupt_all` ran while this thread was blocked
    /// on a queue push or pop
    ///
    /// **Recovery strategy:** The caller decides whether to retry or unwind
    #[error("Blocking queue operation interrupted")]
    Interrupted,

    /// Queue has been terminated
    ///
    /// **When returned:** Pushing to a terminated queue, or popping after a
    /// terminated queue drained its remaining items
    ///
    /// **Recovery strategy:** Stop using the queue
    #[error("Queue terminated")]
    QueueClosed,

    /// Configuration error
    ///
    /// **When returned:** Invalid configuration detected at runtime creation
    ///
    /// **Recovery strategy:** Fix the configuration or fall back to defaults
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    ///
    /// **Recovery strategy:** Fix the caller to provide a valid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error - indicates a bug in the object model
    ///
    /// **When returned:** Invariant violation or unexpected state
    ///
    /// **Recovery strategy:** Cannot recover; report with full context
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LomError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LomError::OutOfMemory { .. }
                | LomError::NotRegistered { .. }
                | LomError::KindMismatch { .. }
                | LomError::Interrupted
                | LomError::QueueClosed
                | LomError::InvalidArgument(_)
        )
    }

    /// Check if this error indicates a bug in the caller or the model
    pub fn is_bug(&self) -> bool {
        matches!(self, LomError::Internal(_))
    }

    /// Check if this error aborts a single transfer without being
    /// recoverable for that tuple
    pub fn is_decode_fatal(&self) -> bool {
        matches!(
            self,
            LomError::CorruptTuple { .. } | LomError::TruncatedTuple { .. }
        )
    }
}

impl From<crate::config::ConfigError> for LomError {
    fn from(err: crate::config::ConfigError) -> Self {
        LomError::Configuration(err.to_string())
    }
}

/// Result type alias for object model operations
pub type Result<T> = std::result::Result<T, LomError>;
