//! Error types used by workers, bridges and their collaborators.
//!
//! This module defines the error enums of the crate:
//!
//! - [`RuntimeError`] — errors raised by the worker runtime itself (binding,
//!   dispatch, channels, shutdown).
//! - [`CodecError`] — a value could not cross the serialization boundary.
//! - [`ServiceError`] — a bound service operation failed.
//! - [`StorageError`] — a datasource or model factory failed.
//! - [`HandlerError`] — a broker subscriber failed.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the worker runtime.
///
/// None of these terminate a worker: they are logged at the site where they
/// happen (or returned to a supervisor-side caller) and the unit keeps running.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Service binding failed after all configured attempts.
    #[error("service binding failed after {attempts} attempt(s): {reason}")]
    BindingFailed {
        /// Number of attempts performed.
        attempts: u32,
        /// Last failure reason.
        reason: String,
    },

    /// An invocation arrived while no service is bound.
    #[error("no service bound")]
    NotBound,

    /// Name matches neither a command nor a bound service operation.
    #[error("unknown operation: {name}")]
    UnknownOperation {
        /// The unmatched message name.
        name: String,
    },

    /// No datasource is registered for the model name.
    #[error("unknown model: {name}")]
    UnknownModel {
        /// Model name that failed to resolve.
        name: String,
    },

    /// A command was invoked with an argument of the wrong shape.
    #[error("invalid argument for '{command}': {reason}")]
    InvalidArgument {
        /// Command name.
        command: &'static str,
        /// What was wrong with the argument.
        reason: String,
    },

    /// Payload failed to cross the serialization boundary.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Bound service operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Datasource or model factory failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The peer side of a channel or control port is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// A caller-side wait exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Shutdown grace period was exceeded; some background tasks were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Background tasks that did not stop in time.
        stuck: Vec<String>,
    },

    /// Worker task ended abnormally (panicked or was aborted).
    #[error("worker {unit} ended abnormally: {reason}")]
    WorkerLost {
        /// Unit identifier of the lost worker.
        unit: u32,
        /// Join failure description.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workerlink::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownOperation { name: "frobnicate".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_operation");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::BindingFailed { .. } => "runtime_binding_failed",
            RuntimeError::NotBound => "runtime_not_bound",
            RuntimeError::UnknownOperation { .. } => "runtime_unknown_operation",
            RuntimeError::UnknownModel { .. } => "runtime_unknown_model",
            RuntimeError::InvalidArgument { .. } => "runtime_invalid_argument",
            RuntimeError::Codec(e) => e.as_label(),
            RuntimeError::Service(e) => e.as_label(),
            RuntimeError::Storage(e) => e.as_label(),
            RuntimeError::ChannelClosed => "runtime_channel_closed",
            RuntimeError::Timeout { .. } => "runtime_timeout",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::WorkerLost { .. } => "runtime_worker_lost",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
            RuntimeError::Codec(e) => e.as_message(),
            other => other.to_string(),
        }
    }

    /// True when the error means a payload could not be made plain data.
    ///
    /// Such messages are dropped; the channel stays up.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            RuntimeError::Codec(_) | RuntimeError::Service(ServiceError::Unserializable { .. })
        )
    }
}

/// # Serialization boundary failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value has no plain-data representation.
    #[error("value is not serializable: {reason}")]
    Encode {
        /// Serializer message.
        reason: String,
    },

    /// The frame is not valid JSON or does not match the expected shape.
    #[error("frame could not be decoded: {reason}")]
    Decode {
        /// Deserializer message.
        reason: String,
    },

    /// The encoded frame exceeds the configured size cap.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Encoded length in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl CodecError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CodecError::Encode { .. } => "codec_encode",
            CodecError::Decode { .. } => "codec_decode",
            CodecError::FrameTooLarge { .. } => "codec_frame_too_large",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            CodecError::Encode { reason } => format!("encode: {reason}"),
            CodecError::Decode { reason } => format!("decode: {reason}"),
            CodecError::FrameTooLarge { len, max } => format!("frame too large: {len}>{max}"),
        }
    }
}

/// # Errors produced by bound service operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Operation ran and failed.
    #[error("operation '{op}' failed: {error}")]
    Fail {
        /// Operation name.
        op: String,
        /// The underlying error message.
        error: String,
    },

    /// Operation result could not be converted to plain data.
    #[error("operation '{op}' returned an unserializable value: {reason}")]
    Unserializable {
        /// Operation name.
        op: String,
        /// Serializer message.
        reason: String,
    },

    /// The service table was rejected while binding.
    #[error("invalid service table: {reason}")]
    InvalidTable {
        /// What was wrong.
        reason: String,
    },
}

impl ServiceError {
    /// Creates a [`ServiceError::Fail`] for operation `op`.
    pub fn fail(op: impl Into<String>, error: impl std::fmt::Display) -> Self {
        ServiceError::Fail {
            op: op.into(),
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Unserializable { .. } => "service_unserializable",
            ServiceError::InvalidTable { .. } => "service_invalid_table",
        }
    }
}

/// # Errors produced by datasources and model factories.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Raw data could not be turned into a model.
    #[error("invalid model '{model}': {reason}")]
    InvalidModel {
        /// Model name.
        model: String,
        /// What was wrong with the data.
        reason: String,
    },

    /// The backing store rejected or failed the operation.
    #[error("storage unavailable: {reason}")]
    Unavailable {
        /// Underlying message.
        reason: String,
    },
}

impl StorageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StorageError::InvalidModel { .. } => "storage_invalid_model",
            StorageError::Unavailable { .. } => "storage_unavailable",
        }
    }
}

/// Failure reported by a broker subscriber.
///
/// The broker logs it and moves on to the next subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler failed: {error}")]
pub struct HandlerError {
    /// The underlying error message.
    pub error: String,
}

impl HandlerError {
    /// Creates a handler error from any displayable value.
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

impl From<CodecError> for HandlerError {
    fn from(e: CodecError) -> Self {
        HandlerError::new(e)
    }
}

impl From<RuntimeError> for HandlerError {
    fn from(e: RuntimeError) -> Self {
        HandlerError::new(e)
    }
}

impl From<&str> for HandlerError {
    fn from(e: &str) -> Self {
        HandlerError::new(e)
    }
}

impl From<String> for HandlerError {
    fn from(error: String) -> Self {
        HandlerError { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(RuntimeError::NotBound.as_label(), "runtime_not_bound");
        assert_eq!(
            RuntimeError::from(CodecError::Decode { reason: "x".into() }).as_label(),
            "codec_decode"
        );
        assert_eq!(ServiceError::fail("add", "boom").as_label(), "service_failed");
    }

    #[test]
    fn serialization_failures_are_recognised() {
        let codec = RuntimeError::from(CodecError::Encode { reason: "fn".into() });
        assert!(codec.is_serialization());

        let svc = RuntimeError::from(ServiceError::Unserializable {
            op: "list".into(),
            reason: "key must be a string".into(),
        });
        assert!(svc.is_serialization());

        assert!(!RuntimeError::ChannelClosed.is_serialization());
    }

    #[test]
    fn grace_message_lists_stuck_tasks() {
        let err = RuntimeError::GraceExceeded {
            grace: Duration::from_secs(1),
            stuck: vec!["bridge".into()],
        };
        assert!(err.as_message().contains("bridge"));
    }
}
