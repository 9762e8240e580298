//! Shared application service layer for hybridctl.
//!
//! Turns a project file into live control point registries and
//! experimental-control adapters, and drives scripted hybrid test runs.
//! The CLI is a thin wrapper over this crate.

pub mod build;
pub mod error;
pub mod project_service;
pub mod run_service;
pub mod transport;

pub use build::{build_control, build_filter, build_registry, build_transport};
pub use error::{AppError, AppResult};
pub use project_service::{
    ControlSummary, get_control, list_controls, load_project, save_project, validate_project,
};
pub use run_service::{
    HistoryShape, RunOptions, RunRecord, RunRequest, StepRecord, load_record, run, run_control,
    save_record,
};
pub use transport::AnyTransport;
