//! Schema migration framework.

use crate::ProjectError;
use crate::schema::Project;

pub const LATEST_VERSION: u32 = 2;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    match project.version {
        1 => migrate_v1_to_v2(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 1 had one `relative` flag per signal acting on both the ctrl and
/// daq paths. Version 2 splits it into four reference flags.
fn migrate_v1_to_v2(mut project: Project) -> Result<Project, ProjectError> {
    for cp in &mut project.control_points {
        for sig in &mut cp.signals {
            if let Some(relative) = sig.relative.take() {
                sig.reference.ctrl = relative;
                sig.reference.daq = relative;
            }
        }
    }
    project.version = 2;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use hc_core::ResponseType;

    #[test]
    fn v1_relative_flag_splits_into_ctrl_and_daq() {
        let mut sig = SignalEntryDef::new(0, ResponseType::Disp);
        sig.relative = Some(true);
        let project = Project {
            version: 1,
            name: "legacy".to_string(),
            control_points: vec![ControlPointDef {
                tag: 1,
                node: None,
                signals: vec![sig, SignalEntryDef::new(0, ResponseType::Force)],
            }],
            filters: vec![],
            controls: vec![],
        };

        let migrated = migrate_to_latest(project).unwrap();
        assert_eq!(migrated.version, LATEST_VERSION);
        let signals = &migrated.control_points[0].signals;
        assert_eq!(signals[0].relative, None);
        assert!(signals[0].reference.ctrl && signals[0].reference.daq);
        assert!(!signals[0].reference.trial && !signals[0].reference.output);
        assert_eq!(signals[1].reference, ReferenceDef::default());
    }

    #[test]
    fn version_zero_has_no_path() {
        let project = Project {
            version: 0,
            name: "ancient".to_string(),
            control_points: vec![],
            filters: vec![],
            controls: vec![],
        };
        assert!(matches!(
            migrate_to_latest(project),
            Err(ProjectError::Migration { .. })
        ));
    }
}
