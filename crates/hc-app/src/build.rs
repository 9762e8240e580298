//! Build live control points, filters, transports and adapters from project
//! definitions.

use std::time::Duration;

use hc_control::{ExperimentalControl, LimitPolicy};
use hc_core::{ControlTag, CpTag, FilterTag, Tag};
use hc_project::schema::{
    ControlDef, ControlPointDef, FilterDef, FilterKindDef, HandshakeModeDef, LimitPolicyDef,
    PollDef, Project, SpecimenDef, TransportDef,
};
use hc_signals::{
    ControlPoint, ControlPointRegistry, NodeInfo, ReferenceFlags, ScaleFilter, SignalDef,
    SignalFilter, Undershoot,
};
use hc_transport::{
    HandshakeMode, LinearSpecimen, MessageTransport, PollOptions, SimulatedController,
};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::transport::AnyTransport;

pub fn build_control_point(def: &ControlPointDef) -> AppResult<ControlPoint> {
    let signals = def
        .signals
        .iter()
        .map(|s| {
            let sig = SignalDef::new(s.dof, s.response)
                .with_factor(s.factor)
                .with_reference(ReferenceFlags {
                    trial: s.reference.trial,
                    output: s.reference.output,
                    ctrl: s.reference.ctrl,
                    daq: s.reference.daq,
                });
            match s.limits {
                Some(lim) => sig.with_limits(lim.lower, lim.upper),
                None => sig,
            }
        })
        .collect();

    let point = ControlPoint::from_signals(CpTag::new(def.tag), signals)?;
    match &def.node {
        Some(node) => Ok(point.with_node(NodeInfo {
            tag: Tag::new(node.tag),
            ndm: node.ndm,
            ndf: node.ndf,
            coords: node.coords.clone(),
        })?),
        None => Ok(point),
    }
}

/// Register every control point of the project.
pub fn build_registry(project: &Project) -> AppResult<ControlPointRegistry> {
    let mut registry = ControlPointRegistry::new();
    for def in &project.control_points {
        registry.add(build_control_point(def)?)?;
    }
    debug!(count = registry.len(), "control points registered");
    Ok(registry)
}

pub fn build_filter(def: &FilterDef) -> Box<dyn SignalFilter> {
    let tag = FilterTag::new(def.tag);
    match def.kind {
        FilterKindDef::Undershoot { amount } => Box::new(Undershoot::new(amount).tagged(tag)),
        FilterKindDef::Scale { gain } => Box::new(ScaleFilter::new(gain).tagged(tag)),
    }
}

pub fn build_transport(def: &TransportDef) -> AppResult<AnyTransport> {
    match def {
        TransportDef::Simulated {
            mode,
            ack_delay,
            specimen,
        } => {
            let mode = match mode {
                HandshakeModeDef::Flags => HandshakeMode::Flags,
                HandshakeModeDef::RoundTrip => HandshakeMode::RoundTrip,
            };
            let controller = SimulatedController::new(build_specimen(specimen)?)
                .with_mode(mode)
                .with_ack_delay(*ack_delay);
            Ok(AnyTransport::Simulated(controller))
        }
        TransportDef::Message { address, data_size } => Ok(AnyTransport::Message(
            MessageTransport::tcp(address.clone(), *data_size),
        )),
        #[cfg(unix)]
        TransportDef::SharedMemory {
            path,
            size_bytes,
            base_offset,
        } => {
            let region = hc_transport::FileRegion::open(std::path::Path::new(path), *size_bytes)?;
            Ok(AnyTransport::SharedMemory(
                hc_transport::SharedMemoryTransport::new(region, *base_offset),
            ))
        }
        #[cfg(not(unix))]
        TransportDef::SharedMemory { .. } => Err(AppError::InvalidInput(
            "shared memory transport needs a unix host".to_string(),
        )),
    }
}

fn build_specimen(def: &SpecimenDef) -> AppResult<LinearSpecimen> {
    let specimen = match def {
        SpecimenDef::Linear { rows, .. } => {
            let num_ctrl = rows.first().map_or(0, Vec::len);
            let flat: Vec<f64> = rows.iter().flatten().copied().collect();
            LinearSpecimen::from_rows(rows.len(), num_ctrl, &flat)?
        }
        SpecimenDef::Springs { stiffness, .. } => LinearSpecimen::springs(stiffness),
    };
    let bias = def.bias();
    if bias.is_empty() {
        Ok(specimen)
    } else {
        Ok(specimen.with_bias(bias)?)
    }
}

pub fn poll_options(def: &PollDef) -> PollOptions {
    let mut options = PollOptions::unbounded().with_interval(Duration::from_millis(def.interval_ms));
    if let Some(ms) = def.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    if let Some(n) = def.max_polls {
        options = options.with_max_polls(n);
    }
    options
}

pub fn limit_policy(def: LimitPolicyDef) -> LimitPolicy {
    match def {
        LimitPolicyDef::Ignore => LimitPolicy::Ignore,
        LimitPolicyDef::Saturate => LimitPolicy::Saturate,
        LimitPolicyDef::Reject => LimitPolicy::Reject,
    }
}

/// Build an adapter in the `Created` state. Sizing and setup are left to
/// the caller.
pub fn build_control(
    project: &Project,
    registry: &ControlPointRegistry,
    def: &ControlDef,
) -> AppResult<ExperimentalControl<AnyTransport>> {
    let trial = registry.resolve(&tags(&def.trial_cps))?;
    let output = registry.resolve(&tags(&def.output_cps))?;
    let transport = build_transport(&def.transport)?;

    let mut control = ExperimentalControl::new(ControlTag::new(def.tag), transport, trial, output)?
        .with_poll_options(poll_options(&def.poll))
        .with_limit_policy(limit_policy(def.limit_policy));

    for assignment in &def.ctrl_filters {
        let filter = lookup_filter(project, def, assignment.filter)?;
        control = control.with_ctrl_filter(assignment.response, build_filter(filter));
    }
    for assignment in &def.daq_filters {
        let filter = lookup_filter(project, def, assignment.filter)?;
        control = control.with_daq_filter(assignment.response, build_filter(filter));
    }

    info!(
        control = def.tag,
        name = %def.name,
        transport = def.transport.label(),
        num_ctrl = control.num_ctrl_signals(),
        num_daq = control.num_daq_signals(),
        "experimental control built"
    );
    Ok(control)
}

fn tags(raw: &[u32]) -> Vec<CpTag> {
    raw.iter().copied().map(CpTag::new).collect()
}

fn lookup_filter<'a>(project: &'a Project, def: &ControlDef, tag: u32) -> AppResult<&'a FilterDef> {
    project.filter(tag).ok_or_else(|| AppError::Build {
        control: def.name.clone(),
        message: format!("filter {tag} is not defined"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::ResponseType;
    use hc_project::schema::{LimitsDef, NodeDef, ReferenceDef, SignalEntryDef};
    use hc_transport::Transport;

    #[test]
    fn control_point_carries_every_signal_attribute() {
        let mut sig = SignalEntryDef::new(1, ResponseType::Disp);
        sig.factor = 25.4;
        sig.limits = Some(LimitsDef {
            lower: -1.0,
            upper: 1.0,
        });
        sig.reference = ReferenceDef {
            output: true,
            daq: true,
            ..ReferenceDef::default()
        };
        let def = ControlPointDef {
            tag: 4,
            node: Some(NodeDef {
                tag: 9,
                ndm: 2,
                ndf: 3,
                coords: vec![],
            }),
            signals: vec![sig],
        };

        let cp = build_control_point(&def).unwrap();
        assert_eq!(cp.tag(), Tag::new(4));
        let built = &cp.signals()[0];
        assert_eq!(built.factor, 25.4);
        assert_eq!(built.limits.map(|l| (l.lower, l.upper)), Some((-1.0, 1.0)));
        assert!(built.reference.output && built.reference.daq);
        assert!(!built.reference.trial && !built.reference.ctrl);
        assert_eq!(cp.node().map(|n| n.ndf), Some(3));
    }

    #[test]
    fn poll_def_maps_to_options() {
        let options = poll_options(&PollDef {
            timeout_ms: Some(250),
            interval_ms: 2,
            max_polls: Some(10),
        });
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.interval, Duration::from_millis(2));
        assert_eq!(options.max_polls, Some(10));
        assert!(!poll_options(&PollDef::default()).is_bounded());
    }

    #[test]
    fn simulated_transport_keeps_mode() {
        let transport = build_transport(&TransportDef::Simulated {
            mode: HandshakeModeDef::RoundTrip,
            ack_delay: 0,
            specimen: SpecimenDef::Springs {
                stiffness: vec![2.0],
                bias: vec![],
            },
        })
        .unwrap();
        assert_eq!(transport.mode(), HandshakeMode::RoundTrip);
        assert!(transport.as_simulated().is_some());
    }

    #[test]
    fn misfit_specimen_bias_is_an_error() {
        let result = build_transport(&TransportDef::Simulated {
            mode: HandshakeModeDef::Flags,
            ack_delay: 0,
            specimen: SpecimenDef::Springs {
                stiffness: vec![2.0],
                bias: vec![0.0, 1.0],
            },
        });
        assert!(matches!(result, Err(AppError::Transport(_))));
    }

    #[test]
    fn filters_keep_their_tag() {
        let filter = build_filter(&FilterDef {
            tag: 3,
            kind: FilterKindDef::Scale { gain: 2.0 },
        });
        assert_eq!(filter.tag(), Some(FilterTag::new(3)));
    }
}
