//! Adapter errors.

use hc_core::{ControlTag, ResponseType};
use hc_signals::SignalError;
use hc_transport::TransportError;
use thiserror::Error;

use crate::adapter::Lifecycle;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Control point or sizing problem.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Transport or protocol failure. The adapter is faulted afterwards.
    #[error("Control {tag}: {op} failed: {source}")]
    Transport {
        tag: ControlTag,
        op: &'static str,
        source: TransportError,
    },

    #[error("Control {tag}: {op} is not allowed while {state}")]
    State {
        tag: ControlTag,
        op: &'static str,
        state: Lifecycle,
    },

    #[error("No {response} vector supplied for signal {slot}")]
    MissingVector { response: ResponseType, slot: usize },

    #[error("{response} vector has {got} entries but the configured size is {expected}")]
    VectorSize {
        response: ResponseType,
        expected: usize,
        got: usize,
    },

    #[error("Signal {slot} command {value} outside limits [{lower}, {upper}]")]
    LimitExceeded {
        slot: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// Shared transport already borrowed by another adapter call.
    #[error("Transport of control {tag} is busy")]
    Busy { tag: ControlTag },
}

impl ControlError {
    /// Configuration-class errors leave the adapter usable.
    pub fn is_config(&self) -> bool {
        match self {
            Self::InvalidArg { .. }
            | Self::Signal(_)
            | Self::MissingVector { .. }
            | Self::VectorSize { .. }
            | Self::LimitExceeded { .. } => true,
            Self::Transport { source, .. } => source.is_config(),
            Self::State { .. } | Self::Busy { .. } => false,
        }
    }
}
