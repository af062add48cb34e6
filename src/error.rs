//! Error types used by the streamvisor runtime and its collaborators.
//!
//! This module defines two error enums:
//!
//! - [`TransportError`]: failures reported by a [`Transport`](crate::Transport)
//!   through its [`Feed`](crate::Feed).
//! - [`SwapError`]: failures returned by the host's [`Swap`](crate::Swap) pipeline.
//!
//! Neither is ever fatal to the manager: transport errors drive the reconnect
//! policy, swap errors are logged and published as runtime events.
//! Both provide helper methods (`as_label`, `as_message`) for logs/metrics.

use thiserror::Error;

/// # Errors reported by a streaming transport.
///
/// A transport reports an error together with the ready state it ended up in.
/// Only errors that leave the handle in [`ReadyState::Closed`](crate::ReadyState::Closed)
/// make the supervisor schedule a reconnect.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {reason}")]
    Connect {
        /// The underlying error message.
        reason: String,
    },

    /// The endpoint answered with a non-success status code.
    #[error("unexpected status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The endpoint answered with something other than `text/event-stream`.
    #[error("unexpected content type {content_type:?}")]
    ContentType {
        /// The content type the endpoint advertised.
        content_type: String,
    },

    /// The event stream broke mid-flight (I/O or framing).
    #[error("stream error: {reason}")]
    Stream {
        /// The underlying error message.
        reason: String,
    },

    /// The server ended the stream.
    #[error("stream ended by server")]
    Ended,
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::TransportError;
    ///
    /// let err = TransportError::Status { status: 502 };
    /// assert_eq!(err.as_label(), "transport_status");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Connect { .. } => "transport_connect",
            TransportError::Status { .. } => "transport_status",
            TransportError::ContentType { .. } => "transport_content_type",
            TransportError::Stream { .. } => "transport_stream",
            TransportError::Ended => "transport_ended",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransportError::Connect { reason } => format!("connect: {reason}"),
            TransportError::Status { status } => format!("status: {status}"),
            TransportError::ContentType { content_type } => {
                format!("content-type: {content_type}")
            }
            TransportError::Stream { reason } => format!("stream: {reason}"),
            TransportError::Ended => "ended".to_string(),
        }
    }
}

/// # Error returned by the host's swap pipeline.
///
/// The manager never retries or re-raises a swap failure; it stays in the
/// host's domain and is only reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("swap failed: {reason}")]
pub struct SwapError {
    /// The underlying error message.
    pub reason: String,
}

impl SwapError {
    /// Creates a swap error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "swap_failed"
    }
}
