//! Project loading, saving, validation, and introspection.

use std::path::Path;

use hc_project::schema::{ControlDef, Project};

use crate::error::{AppError, AppResult};

/// Summary of an experimental control for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSummary {
    pub tag: u32,
    pub name: String,
    pub transport: &'static str,
    pub trial_cps: Vec<u32>,
    pub output_cps: Vec<u32>,
    pub num_ctrl_signals: usize,
    pub num_daq_signals: usize,
}

/// Load, migrate and validate a YAML or JSON project.
pub fn load_project(path: &Path) -> AppResult<Project> {
    Ok(hc_project::load_project(path)?)
}

pub fn save_project(path: &Path, project: &Project) -> AppResult<()> {
    Ok(hc_project::save_project(path, project)?)
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    Ok(hc_project::validate_project(project)?)
}

pub fn list_controls(project: &Project) -> Vec<ControlSummary> {
    project
        .controls
        .iter()
        .map(|c| ControlSummary {
            tag: c.tag,
            name: c.name.clone(),
            transport: c.transport.label(),
            trial_cps: c.trial_cps.clone(),
            output_cps: c.output_cps.clone(),
            num_ctrl_signals: project.signal_count(&c.trial_cps),
            num_daq_signals: project.signal_count(&c.output_cps),
        })
        .collect()
}

/// Find a control by name or tag.
pub fn get_control<'a>(project: &'a Project, key: &str) -> AppResult<&'a ControlDef> {
    project
        .find_control(key)
        .ok_or_else(|| AppError::ControlNotFound(key.to_string()))
}
