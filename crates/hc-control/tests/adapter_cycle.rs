//! Adapter cycles against the in-process simulated controller.

use std::rc::Rc;

use hc_control::{
    ControlError, ExperimentalControl, LimitPolicy, Lifecycle, ResponseVectors, ResponseVectorsMut,
};
use hc_core::{CoreError, ResponseSizes, ResponseType, Tag};
use hc_signals::{ControlPoint, ScaleFilter, SignalError, Undershoot};
use hc_transport::{
    HandshakeMode, LinearSpecimen, PollOptions, SimulatedController, Transport, TransportError,
};

type SimAdapter = ExperimentalControl<SimulatedController<LinearSpecimen>>;

fn disp_trial() -> ControlPoint {
    ControlPoint::new(Tag::new(1), &[0], &[ResponseType::Disp]).unwrap()
}

fn disp_force_output() -> ControlPoint {
    ControlPoint::new(
        Tag::new(2),
        &[0, 0],
        &[ResponseType::Disp, ResponseType::Force],
    )
    .unwrap()
}

/// Measured displacement follows the command, force is 4x it.
fn specimen(bias: [f64; 2]) -> LinearSpecimen {
    LinearSpecimen::from_rows(2, 1, &[1.0, 4.0])
        .unwrap()
        .with_bias(&bias)
        .unwrap()
}

fn adapter_with(
    trial: ControlPoint,
    output: ControlPoint,
    controller: SimulatedController<LinearSpecimen>,
) -> SimAdapter {
    ExperimentalControl::new(
        Tag::new(10),
        controller,
        vec![Rc::new(trial)],
        vec![Rc::new(output)],
    )
    .unwrap()
}

fn trial_sizes() -> ResponseSizes {
    ResponseSizes::zero().with(ResponseType::Disp, 1)
}

fn output_sizes() -> ResponseSizes {
    ResponseSizes::zero()
        .with(ResponseType::Disp, 1)
        .with(ResponseType::Force, 1)
}

fn running(trial: ControlPoint, output: ControlPoint, bias: [f64; 2]) -> SimAdapter {
    let mut adapter = adapter_with(trial, output, SimulatedController::new(specimen(bias)));
    adapter.configure_sizes(trial_sizes(), output_sizes()).unwrap();
    adapter.setup().unwrap();
    adapter
}

fn step(adapter: &mut SimAdapter, x: f64) -> (f64, f64) {
    let disp = [x];
    adapter
        .drive_trial(&ResponseVectors::new().disp(&disp))
        .unwrap();
    let mut d = [0.0];
    let mut f = [0.0];
    adapter
        .read_measured(&mut ResponseVectorsMut::new().disp(&mut d).force(&mut f))
        .unwrap();
    (d[0], f[0])
}

#[test]
fn absolute_cycle_routes_values() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    assert_eq!(adapter.state(), Lifecycle::Running);
    assert_eq!(step(&mut adapter, 0.5), (0.5, 2.0));
    assert_eq!(adapter.ctrl_signal(), &[0.5]);
    assert_eq!(adapter.daq_signal(), &[0.5, 2.0]);
    adapter.commit().unwrap();
    assert_eq!(adapter.transport().borrow().counters().commits, 1);
}

#[test]
fn each_control_cycle_writes_flag_twice() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    let before = adapter.transport().borrow().counters();
    step(&mut adapter, 0.25);
    let after = adapter.transport().borrow().counters();
    assert_eq!(after.flag_writes - before.flag_writes, 2);
    // two ack polls plus one at-target poll
    assert_eq!(after.flag_reads - before.flag_reads, 3);
}

#[test]
fn undersized_configuration_rejected() {
    let mut adapter = adapter_with(
        disp_trial(),
        disp_force_output(),
        SimulatedController::new(specimen([0.0, 0.0])),
    );
    let err = adapter
        .configure_sizes(trial_sizes(), ResponseSizes::zero().with(ResponseType::Disp, 1))
        .unwrap_err();
    assert_eq!(
        err,
        ControlError::Signal(SignalError::SizeShortfall {
            response: ResponseType::Force,
            required: 1,
            offered: 0,
        })
    );
    assert!(err.is_config());
    assert_eq!(adapter.state(), Lifecycle::Created);
}

#[test]
fn sizes_derived_from_points() {
    let mut adapter = adapter_with(
        disp_trial(),
        disp_force_output(),
        SimulatedController::new(specimen([0.0, 0.0])),
    );
    let sizes = adapter.configure_sizes_from_points().unwrap();
    assert_eq!(sizes.trial, trial_sizes());
    assert_eq!(sizes.output, output_sizes());
}

#[test]
fn calls_out_of_order_fail() {
    let mut adapter = adapter_with(
        disp_trial(),
        disp_force_output(),
        SimulatedController::new(specimen([0.0, 0.0])),
    );
    assert!(matches!(
        adapter.setup(),
        Err(ControlError::State {
            op: "setup",
            state: Lifecycle::Created,
            ..
        })
    ));
    let disp = [0.0];
    assert!(matches!(
        adapter.drive_trial(&ResponseVectors::new().disp(&disp)),
        Err(ControlError::State { .. })
    ));
}

#[test]
fn relative_ctrl_starts_from_measured_state() {
    let trial = disp_trial().with_ctrl_reference(&[true]).unwrap();
    let mut adapter = running(trial, disp_force_output(), [2.0, 20.0]);
    assert_eq!(adapter.ctrl_offsets(), &[2.0]);
    assert_eq!(adapter.ctrl_signal(), &[2.0]);

    let (d, f) = step(&mut adapter, 0.5);
    assert_eq!(adapter.ctrl_signal(), &[2.5]);
    assert_eq!((d, f), (4.5, 30.0));
}

#[test]
fn relative_daq_rezeroes_first_reading() {
    let output = disp_force_output()
        .with_daq_reference(&[true, true])
        .unwrap();
    let mut adapter = running(disp_trial(), output, [3.0, 1.0]);
    assert_eq!(adapter.daq_offsets(), &[-3.0, -1.0]);
    assert_eq!(step(&mut adapter, 0.5), (0.5, 2.0));
}

#[test]
fn relative_trial_zeroes_first_command() {
    let trial = disp_trial().with_trial_reference(&[true]).unwrap();
    let mut adapter = running(trial, disp_force_output(), [0.0, 0.0]);
    step(&mut adapter, 5.0);
    assert_eq!(adapter.trial_offsets(), &[-5.0]);
    assert_eq!(adapter.ctrl_signal(), &[0.0]);
    step(&mut adapter, 6.0);
    assert_eq!(adapter.ctrl_signal(), &[1.0]);
    assert_eq!(adapter.response("ctrlSignals"), Some(&[1.0][..]));
}

#[test]
fn factors_scale_out_and_back() {
    let trial = disp_trial().with_factors(&[2.0]).unwrap();
    let output = disp_force_output().with_factors(&[2.0, 4.0]).unwrap();
    let mut adapter = running(trial, output, [0.0, 0.0]);
    let (d, f) = step(&mut adapter, 0.5);
    assert_eq!(adapter.ctrl_signal(), &[1.0]);
    assert_eq!(adapter.daq_signal(), &[1.0, 4.0]);
    assert_eq!((d, f), (0.5, 1.0));
}

#[test]
fn ctrl_filter_applies_before_send() {
    let mut adapter = adapter_with(
        disp_trial(),
        disp_force_output(),
        SimulatedController::new(specimen([0.0, 0.0])),
    )
    .with_ctrl_filter(ResponseType::Disp, Box::new(ScaleFilter::new(2.0)));
    adapter.configure_sizes(trial_sizes(), output_sizes()).unwrap();
    adapter.setup().unwrap();
    assert_eq!(step(&mut adapter, 0.25), (0.5, 2.0));
}

#[test]
fn reject_policy_fails_before_io() {
    let trial = disp_trial().with_limits(&[-1.0], &[1.0]).unwrap();
    let mut adapter = adapter_with(
        trial,
        disp_force_output(),
        SimulatedController::new(specimen([0.0, 0.0])),
    )
    .with_limit_policy(LimitPolicy::Reject);
    adapter.configure_sizes(trial_sizes(), output_sizes()).unwrap();
    adapter.setup().unwrap();
    let writes = adapter.transport().borrow().counters().vector_writes;

    let disp = [2.0];
    let err = adapter
        .drive_trial(&ResponseVectors::new().disp(&disp))
        .unwrap_err();
    assert!(matches!(err, ControlError::LimitExceeded { slot: 0, .. }));
    assert_eq!(adapter.transport().borrow().counters().vector_writes, writes);
    assert_eq!(adapter.state(), Lifecycle::Running);
}

#[test]
fn non_finite_trial_never_reaches_controller() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    let writes = adapter.transport().borrow().counters().vector_writes;

    let disp = [f64::NAN];
    let err = adapter
        .drive_trial(&ResponseVectors::new().disp(&disp))
        .unwrap_err();
    assert!(matches!(
        err,
        ControlError::Signal(SignalError::Core(CoreError::NonFinite { .. }))
    ));
    assert_eq!(adapter.transport().borrow().counters().vector_writes, writes);
    assert_eq!(adapter.state(), Lifecycle::Running);
}

fn two_disp_adapter() -> SimAdapter {
    let trial = ControlPoint::new(Tag::new(1), &[0, 1], &[ResponseType::Disp, ResponseType::Disp])
        .unwrap()
        .with_limits(&[-1.0, -1.0], &[1.0, 1.0])
        .unwrap();
    let output = ControlPoint::new(Tag::new(2), &[0, 1], &[ResponseType::Disp, ResponseType::Disp])
        .unwrap();
    let mut adapter = adapter_with(
        trial,
        output,
        SimulatedController::new(LinearSpecimen::springs(&[1.0, 1.0])),
    )
    .with_limit_policy(LimitPolicy::Reject)
    .with_ctrl_filter(ResponseType::Disp, Box::new(Undershoot::new(0.1)));
    let sizes = ResponseSizes::zero().with(ResponseType::Disp, 2);
    adapter.configure_sizes(sizes, sizes).unwrap();
    adapter.setup().unwrap();
    adapter
}

#[test]
fn rejected_step_leaves_filters_untouched() {
    let mut fresh = two_disp_adapter();
    let disp = [1.0, 0.5];
    fresh.drive_trial(&ResponseVectors::new().disp(&disp)).unwrap();

    let mut retried = two_disp_adapter();
    let over = [1.0, 5.0];
    assert!(matches!(
        retried.drive_trial(&ResponseVectors::new().disp(&over)),
        Err(ControlError::LimitExceeded { slot: 1, .. })
    ));
    assert_eq!(retried.state(), Lifecycle::Running);
    retried.drive_trial(&ResponseVectors::new().disp(&disp)).unwrap();

    assert_eq!(retried.ctrl_signal(), fresh.ctrl_signal());
}

#[test]
fn non_finite_step_captures_no_trial_offset() {
    let trial = disp_trial().with_trial_reference(&[true]).unwrap();
    let mut adapter = running(trial, disp_force_output(), [0.0, 0.0]);

    let nan = [f64::NAN];
    assert!(adapter.drive_trial(&ResponseVectors::new().disp(&nan)).is_err());

    let zero = [0.0];
    adapter.drive_trial(&ResponseVectors::new().disp(&zero)).unwrap();
    assert_eq!(adapter.ctrl_signal(), &[0.0]);
    assert_eq!(step(&mut adapter, 0.5), (0.5, 2.0));
}

#[test]
fn saturate_policy_clamps() {
    let trial = disp_trial().with_limits(&[-1.0], &[1.0]).unwrap();
    let mut adapter = adapter_with(
        trial,
        disp_force_output(),
        SimulatedController::new(specimen([0.0, 0.0])),
    )
    .with_limit_policy(LimitPolicy::Saturate);
    adapter.configure_sizes(trial_sizes(), output_sizes()).unwrap();
    adapter.setup().unwrap();
    assert_eq!(step(&mut adapter, -3.0), (-1.0, -4.0));
}

#[test]
fn missing_or_misfit_vectors_rejected() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    assert_eq!(
        adapter.drive_trial(&ResponseVectors::new()).unwrap_err(),
        ControlError::MissingVector {
            response: ResponseType::Disp,
            slot: 0
        }
    );
    let long = [0.0, 0.0];
    assert!(matches!(
        adapter.drive_trial(&ResponseVectors::new().disp(&long)),
        Err(ControlError::VectorSize { expected: 1, got: 2, .. })
    ));

    // unused types may be absent on input; a present force vector is ignored
    let disp = [0.1];
    let force = [9.0];
    adapter
        .drive_trial(&ResponseVectors::new().disp(&disp).force(&force))
        .unwrap();

    // absent output vectors are skipped, present ones must fit
    let mut d = [0.0];
    adapter
        .read_measured(&mut ResponseVectorsMut::new().disp(&mut d))
        .unwrap();
    assert_eq!(d, [0.1]);
    let mut wide = [0.0, 0.0];
    assert!(matches!(
        adapter.read_measured(&mut ResponseVectorsMut::new().disp(&mut wide)),
        Err(ControlError::VectorSize { expected: 1, got: 2, .. })
    ));
}

#[test]
fn unrouted_outputs_left_untouched() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    let disp = [0.5];
    adapter
        .drive_trial(&ResponseVectors::new().disp(&disp))
        .unwrap();
    let mut d = [0.0];
    let mut f = [0.0];
    let mut v = [7.0, 7.0];
    adapter
        .read_measured(
            &mut ResponseVectorsMut::new()
                .disp(&mut d)
                .force(&mut f)
                .vel(&mut v),
        )
        .unwrap();
    assert_eq!(v, [7.0, 7.0]);
}

#[test]
fn transport_failure_faults_adapter() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    adapter.transport().borrow_mut().disconnect().unwrap();

    let disp = [0.5];
    let err = adapter
        .drive_trial(&ResponseVectors::new().disp(&disp))
        .unwrap_err();
    assert!(matches!(
        err,
        ControlError::Transport {
            op: "drive trial",
            source: TransportError::NotConnected,
            ..
        }
    ));
    assert!(!err.is_config());
    assert_eq!(adapter.state(), Lifecycle::Faulted);
    assert!(matches!(
        adapter.commit(),
        Err(ControlError::State {
            state: Lifecycle::Faulted,
            ..
        })
    ));
}

#[test]
fn stalled_ack_times_out_during_setup() {
    let controller = SimulatedController::new(specimen([0.0, 0.0])).with_ack_delay(100);
    let mut adapter = adapter_with(disp_trial(), disp_force_output(), controller)
        .with_poll_options(PollOptions::unbounded().with_max_polls(3));
    adapter.configure_sizes(trial_sizes(), output_sizes()).unwrap();
    let err = adapter.setup().unwrap_err();
    assert!(matches!(
        err,
        ControlError::Transport {
            source: TransportError::Timeout { polls: 3, .. },
            ..
        }
    ));
    assert_eq!(adapter.state(), Lifecycle::Faulted);
    assert!(!adapter.transport().borrow().is_connected());
}

#[test]
fn round_trip_transport_cycle() {
    let controller = SimulatedController::new(specimen([0.0, 0.0])).with_mode(HandshakeMode::RoundTrip);
    let mut adapter = adapter_with(disp_trial(), disp_force_output(), controller);
    adapter.configure_sizes(trial_sizes(), output_sizes()).unwrap();
    adapter.setup().unwrap();
    assert_eq!(step(&mut adapter, 1.5), (1.5, 6.0));
    assert_eq!(adapter.transport().borrow().counters().flag_reads, 0);
}

#[test]
fn copies_share_transport_not_offsets() {
    let trial = disp_trial().with_trial_reference(&[true]).unwrap();
    let mut primary = running(trial, disp_force_output(), [0.0, 0.0]);
    step(&mut primary, 5.0);

    let mut copy = primary.get_copy();
    assert!(Rc::ptr_eq(&primary.transport(), &copy.transport()));
    assert_eq!(copy.state(), Lifecycle::Sized);
    assert!(copy.trial_offsets().is_empty());

    copy.setup().unwrap();
    step(&mut copy, 2.0);
    assert_eq!(copy.trial_offsets(), &[-2.0]);
    assert_eq!(primary.trial_offsets(), &[-5.0]);

    drop(copy);
    assert!(primary.transport().borrow().is_connected());
    step(&mut primary, 6.0);
    assert_eq!(primary.ctrl_signal(), &[1.0]);
}

#[test]
fn shutdown_disconnects() {
    let mut adapter = running(disp_trial(), disp_force_output(), [0.0, 0.0]);
    adapter.shutdown().unwrap();
    assert!(!adapter.transport().borrow().is_connected());
    assert_eq!(adapter.state(), Lifecycle::Faulted);
}

#[test]
fn empty_point_lists_rejected() {
    let err = ExperimentalControl::new(
        Tag::new(1),
        SimulatedController::new(specimen([0.0, 0.0])),
        Vec::new(),
        vec![Rc::new(disp_force_output())],
    )
    .unwrap_err();
    assert!(matches!(err, ControlError::InvalidArg { .. }));
}
