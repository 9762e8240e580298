//! Error types for control point and signal routing operations.

use hc_core::{CoreError, CpTag, ResponseType};
use thiserror::Error;

/// Result type for signal routing operations.
pub type SignalResult<T> = Result<T, SignalError>;

/// Configuration errors detected while building or sizing signal maps.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    /// Invalid argument provided to a signal function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Parallel per-signal arrays disagree in length.
    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Control point declared without any signal.
    #[error("Control point {tag} has no signals")]
    EmptyControlPoint { tag: CpTag },

    /// Lower limit above upper limit, or a NaN bound.
    #[error("Invalid limits for signal {index}: lower {lower} must not exceed upper {upper}")]
    InvalidLimits { index: usize, lower: f64, upper: f64 },

    /// Dof index not available on the associated node.
    #[error("Control point {tag}: dof {dof} exceeds node ndf {ndf}")]
    DofOutOfRange { tag: CpTag, dof: usize, ndf: usize },

    /// Control point tag already registered.
    #[error("Duplicate control point tag: {tag}")]
    DuplicateTag { tag: CpTag },

    /// Control point tag not found in the registry.
    #[error("Control point not found: {tag}")]
    MissingControlPoint { tag: CpTag },

    /// Caller offers fewer components than the control points use.
    #[error("Size for {response} is {offered} but control points require {required}")]
    SizeShortfall {
        response: ResponseType,
        required: usize,
        offered: usize,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}
