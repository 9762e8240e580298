use std::path::PathBuf;

fn workspace_root() -> PathBuf {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    crate_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

#[test]
fn demos_validate() {
    let root = workspace_root();
    let demos = [
        "demos/projects/01_single_actuator.yaml",
        "demos/projects/02_two_dof_relative.yaml",
        "demos/projects/03_legacy_v1.yaml",
        "demos/projects/04_round_trip.yaml",
        "demos/projects/05_tcp_controller.yaml",
    ];

    for rel in demos {
        let path = root.join(rel);
        let result = hc_project::load_project(&path);
        assert!(
            result.is_ok(),
            "demo failed validation: {} => {:?}",
            path.display(),
            result.err()
        );
    }
}

#[test]
fn legacy_demo_is_migrated() {
    let path = workspace_root().join("demos/projects/03_legacy_v1.yaml");
    let project = hc_project::load_project(&path).unwrap();
    assert_eq!(project.version, hc_project::LATEST_VERSION);
    for sig in &project.control_points[1].signals[..1] {
        assert!(sig.reference.ctrl);
        assert!(sig.reference.daq);
        assert!(sig.relative.is_none());
    }
    assert!(!project.control_points[1].signals[1].reference.daq);
}
