//! Control point signal routing for hybridctl.
//!
//! This crate owns the bookkeeping that sits between a simulation's
//! per-response-type vectors and the flat signal arrays exchanged with a
//! remote controller. Transports and the handshake live in `hc-transport`;
//! the adapter that composes everything lives in `hc-control`.
//!
//! # Architecture
//!
//! - A [`ControlPoint`] is an ordered list of scalar signals, each tagged with
//!   a dof index, a response type, a scale factor, optional limits and four
//!   reference flags
//! - A [`SignalMap`] flattens a list of control points into descriptors in
//!   list-then-declaration order; that order is the index correspondence used
//!   by everything else
//! - An [`OffsetTracker`] captures and applies trial, ctrl and daq offsets
//!   around the optional per-response-type [`FilterBank`]
//!
//! # Pipeline ordering
//!
//! - Outgoing: trial offset, then filter, then ctrl offset
//! - Incoming: daq offset, then filter

pub mod control_point;
pub mod error;
pub mod filter;
pub mod offset;
pub mod registry;
pub mod signal_map;

pub use control_point::{ControlPoint, Limits, NodeInfo, ReferenceFlags, SignalDef};
pub use error::{SignalError, SignalResult};
pub use filter::{FilterBank, ScaleFilter, SignalFilter, Undershoot};
pub use offset::OffsetTracker;
pub use registry::ControlPointRegistry;
pub use signal_map::{
    SignalDescriptor, SignalMap, flatten_signals, max_dof_per_response_type,
};
