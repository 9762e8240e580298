//! Transport and handshake errors.

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Transport parameters cannot carry the configured signals.
    #[error("Transport configuration error: {what}")]
    Config { what: String },

    /// Vendor or device call returned a failure code.
    #[error("{op} failed with device code {code}")]
    Device { op: &'static str, code: i32 },

    /// Stream or socket failure. `io::Error` is not `Clone`, so only the
    /// rendered message is kept.
    #[error("I/O error during {op}: {message}")]
    Io { op: &'static str, message: String },

    /// Remote side answered with something the protocol does not allow.
    #[error("Protocol violation during {op}: {detail}")]
    Protocol { op: &'static str, detail: String },

    #[error("Timed out waiting for {what} after {polls} polls ({elapsed_ms} ms)")]
    Timeout {
        what: &'static str,
        polls: usize,
        elapsed_ms: u128,
    },

    #[error("Cancelled while waiting for {what}")]
    Cancelled { what: &'static str },

    #[error("{op} is not supported by the {transport} transport")]
    Unsupported {
        op: &'static str,
        transport: &'static str,
    },

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Transport is not configured")]
    NotConfigured,

    #[error("Region access out of bounds: offset {offset} + {len} > {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

impl TransportError {
    pub fn io(op: &'static str, err: std::io::Error) -> Self {
        Self::Io {
            op,
            message: err.to_string(),
        }
    }

    /// True for errors caused by configuration rather than a failing device.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidArg { .. } | Self::Config { .. } | Self::LengthMismatch { .. }
        )
    }
}
