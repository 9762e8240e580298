//! Project validation logic.

use std::collections::HashSet;

use crate::schema::{
    ControlDef, ControlPointDef, FilterAssignmentDef, FilterKindDef, PollDef, Project, SpecimenDef,
    TransportDef,
};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: String, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    let mut cp_tags = HashSet::new();
    for cp in &project.control_points {
        if !cp_tags.insert(cp.tag) {
            return Err(ValidationError::DuplicateId {
                id: cp.tag.to_string(),
                context: "control_points".to_string(),
            });
        }
        validate_control_point(cp)?;
    }

    let mut filter_tags = HashSet::new();
    for filter in &project.filters {
        if !filter_tags.insert(filter.tag) {
            return Err(ValidationError::DuplicateId {
                id: filter.tag.to_string(),
                context: "filters".to_string(),
            });
        }
        let (field, value) = match filter.kind {
            FilterKindDef::Undershoot { amount } => ("amount", amount),
            FilterKindDef::Scale { gain } => ("gain", gain),
        };
        if !value.is_finite() {
            return Err(invalid(
                format!("filter {} {field}", filter.tag),
                value,
                "must be finite",
            ));
        }
    }

    let mut control_tags = HashSet::new();
    let mut control_names = HashSet::new();
    for control in &project.controls {
        if !control_tags.insert(control.tag) {
            return Err(ValidationError::DuplicateId {
                id: control.tag.to_string(),
                context: "controls".to_string(),
            });
        }
        if !control_names.insert(control.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: control.name.clone(),
                context: "control names".to_string(),
            });
        }
        validate_control(project, control, &cp_tags, &filter_tags)?;
    }

    Ok(())
}

fn validate_control_point(cp: &ControlPointDef) -> Result<(), ValidationError> {
    if cp.signals.is_empty() {
        return Err(invalid(
            format!("control point {} signals", cp.tag),
            "[]",
            "at least one signal is required",
        ));
    }

    let at_latest = crate::migrate::LATEST_VERSION;
    for (i, sig) in cp.signals.iter().enumerate() {
        let field = |name: &str| format!("control point {} signal {i} {name}", cp.tag);
        if !sig.factor.is_finite() || sig.factor == 0.0 {
            return Err(invalid(field("factor"), sig.factor, "must be finite and nonzero"));
        }
        if let Some(lim) = sig.limits {
            if !(lim.lower <= lim.upper) {
                return Err(invalid(
                    field("limits"),
                    format!("[{}, {}]", lim.lower, lim.upper),
                    "lower must not exceed upper",
                ));
            }
        }
        if sig.relative.is_some() {
            return Err(ValidationError::Unsupported {
                feature: field("relative"),
                reason: format!("replaced by reference flags in version {at_latest}"),
            });
        }
        if let Some(node) = &cp.node {
            if sig.dof >= node.ndf {
                return Err(invalid(
                    field("dof"),
                    sig.dof,
                    "exceeds the node's degrees of freedom",
                ));
            }
        }
    }
    Ok(())
}

fn validate_control(
    project: &Project,
    control: &ControlDef,
    cp_tags: &HashSet<u32>,
    filter_tags: &HashSet<u32>,
) -> Result<(), ValidationError> {
    for (list, context) in [
        (&control.trial_cps, "trial_cps"),
        (&control.output_cps, "output_cps"),
    ] {
        if list.is_empty() {
            return Err(invalid(
                format!("control {} {context}", control.name),
                "[]",
                "at least one control point is required",
            ));
        }
        for tag in list {
            if !cp_tags.contains(tag) {
                return Err(ValidationError::MissingReference {
                    id: tag.to_string(),
                    context: format!("control {} {context}", control.name),
                });
            }
        }
    }

    validate_assignments(&control.ctrl_filters, filter_tags, control, "ctrl_filters")?;
    validate_assignments(&control.daq_filters, filter_tags, control, "daq_filters")?;
    validate_poll(&control.poll, control)?;

    let num_ctrl = project.signal_count(&control.trial_cps);
    let num_daq = project.signal_count(&control.output_cps);
    validate_transport(&control.transport, control, num_ctrl, num_daq)
}

fn validate_assignments(
    assignments: &[FilterAssignmentDef],
    filter_tags: &HashSet<u32>,
    control: &ControlDef,
    context: &str,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for a in assignments {
        if !seen.insert(a.response) {
            return Err(ValidationError::DuplicateId {
                id: a.response.to_string(),
                context: format!("control {} {context}", control.name),
            });
        }
        if !filter_tags.contains(&a.filter) {
            return Err(ValidationError::MissingReference {
                id: a.filter.to_string(),
                context: format!("control {} {context}", control.name),
            });
        }
    }
    Ok(())
}

fn validate_poll(poll: &PollDef, control: &ControlDef) -> Result<(), ValidationError> {
    if poll.max_polls == Some(0) {
        return Err(invalid(
            format!("control {} poll.max_polls", control.name),
            0,
            "must be positive",
        ));
    }
    if poll.timeout_ms == Some(0) {
        return Err(invalid(
            format!("control {} poll.timeout_ms", control.name),
            0,
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_transport(
    transport: &TransportDef,
    control: &ControlDef,
    num_ctrl: usize,
    num_daq: usize,
) -> Result<(), ValidationError> {
    let field = |name: &str| format!("control {} transport {name}", control.name);
    match transport {
        TransportDef::Simulated { specimen, .. } => {
            if let SpecimenDef::Linear { rows, .. } = specimen {
                if let Some(row) = rows.iter().find(|r| r.len() != num_ctrl) {
                    return Err(invalid(
                        field("specimen rows"),
                        row.len(),
                        "each row needs one entry per ctrl signal",
                    ));
                }
            }
            let (ctrl, daq) = specimen.shape();
            if (ctrl, daq) != (num_ctrl, num_daq) {
                return Err(invalid(
                    field("specimen"),
                    format!("{ctrl}x{daq}"),
                    &format!("control has {num_ctrl} ctrl and {num_daq} daq signals"),
                ));
            }
            let bias = specimen.bias();
            if !bias.is_empty() && bias.len() != num_daq {
                return Err(invalid(
                    field("specimen bias"),
                    bias.len(),
                    "needs one entry per daq signal",
                ));
            }
        }
        TransportDef::Message { address, data_size } => {
            if address.trim().is_empty() {
                return Err(invalid(field("address"), "\"\"", "must not be empty"));
            }
            if num_ctrl + 1 > *data_size || num_daq > *data_size {
                return Err(invalid(
                    field("data_size"),
                    data_size,
                    "too small for the opcode plus signals",
                ));
            }
        }
        TransportDef::SharedMemory {
            path,
            size_bytes,
            base_offset,
        } => {
            if path.trim().is_empty() {
                return Err(invalid(field("path"), "\"\"", "must not be empty"));
            }
            let needed = base_offset + 3 * 4 + 4 * (num_ctrl + num_daq);
            if needed > *size_bytes {
                return Err(invalid(
                    field("size_bytes"),
                    size_bytes,
                    &format!("record needs {needed} bytes"),
                ));
            }
        }
    }
    Ok(())
}
