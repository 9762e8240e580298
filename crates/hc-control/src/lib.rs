//! Experimental control adapter for hybrid simulation.
//!
//! [`ExperimentalControl`] is the façade a time-stepping simulation talks
//! to. Each step:
//!
//! 1. [`ExperimentalControl::drive_trial`]: gather trial values per signal,
//!    scale by the signal factor, apply trial offset, filter and ctrl
//!    offset, enforce limits, then run the control handshake
//! 2. [`ExperimentalControl::read_measured`]: run the acquire handshake,
//!    apply daq offset and filter, divide by the factor and scatter into
//!    the caller's vectors
//! 3. [`ExperimentalControl::commit`] once the step has converged
//!
//! Transport failures are terminal: the adapter moves to
//! [`Lifecycle::Faulted`] and releases its transport.

pub mod adapter;
pub mod error;
pub mod limits;
pub mod recorder;
pub mod vectors;

pub use adapter::{ConfiguredSizes, ExperimentalControl, Lifecycle, Shared};
pub use error::{ControlError, ControlResult};
pub use limits::LimitPolicy;
pub use recorder::RecorderQuery;
pub use vectors::{ResponseVectors, ResponseVectorsMut};
