//! Project schema definitions.
//!
//! Degrees of freedom are zero-based. Tags are plain integers and only need
//! to be unique within their own list.

use hc_core::{ResponseSizes, ResponseType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub control_points: Vec<ControlPointDef>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    #[serde(default)]
    pub controls: Vec<ControlDef>,
}

impl Project {
    pub fn control_point(&self, tag: u32) -> Option<&ControlPointDef> {
        self.control_points.iter().find(|cp| cp.tag == tag)
    }

    pub fn filter(&self, tag: u32) -> Option<&FilterDef> {
        self.filters.iter().find(|f| f.tag == tag)
    }

    pub fn control(&self, tag: u32) -> Option<&ControlDef> {
        self.controls.iter().find(|c| c.tag == tag)
    }

    /// Look a control up by name, falling back to its tag.
    pub fn find_control(&self, key: &str) -> Option<&ControlDef> {
        self.controls
            .iter()
            .find(|c| c.name == key)
            .or_else(|| key.parse::<u32>().ok().and_then(|tag| self.control(tag)))
    }

    /// Total signal count over a list of control point tags. Unknown tags
    /// contribute nothing.
    pub fn signal_count(&self, tags: &[u32]) -> usize {
        tags.iter()
            .filter_map(|&tag| self.control_point(tag))
            .map(|cp| cp.signals.len())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlPointDef {
    pub tag: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeDef>,
    #[serde(default)]
    pub signals: Vec<SignalEntryDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub tag: u32,
    pub ndm: usize,
    pub ndf: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coords: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalEntryDef {
    pub dof: usize,
    pub response: ResponseType,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsDef>,
    #[serde(default)]
    pub reference: ReferenceDef,
    /// Version 1 single relative flag, folded into `reference` on migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<bool>,
}

fn default_factor() -> f64 {
    1.0
}

impl SignalEntryDef {
    pub fn new(dof: usize, response: ResponseType) -> Self {
        Self {
            dof,
            response,
            factor: 1.0,
            limits: None,
            reference: ReferenceDef::default(),
            relative: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LimitsDef {
    pub lower: f64,
    pub upper: f64,
}

/// Which of the four signal paths treat this signal as relative.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReferenceDef {
    pub trial: bool,
    pub output: bool,
    pub ctrl: bool,
    pub daq: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterDef {
    pub tag: u32,
    pub kind: FilterKindDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FilterKindDef {
    Undershoot { amount: f64 },
    Scale { gain: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlDef {
    pub tag: u32,
    pub name: String,
    pub transport: TransportDef,
    pub trial_cps: Vec<u32>,
    pub output_cps: Vec<u32>,
    #[serde(default)]
    pub poll: PollDef,
    #[serde(default)]
    pub limit_policy: LimitPolicyDef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctrl_filters: Vec<FilterAssignmentDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub daq_filters: Vec<FilterAssignmentDef>,
    /// Explicit trial/output sizes. Derived from the control points when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<SizesDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterAssignmentDef {
    pub response: ResponseType,
    pub filter: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizesDef {
    pub trial: ResponseSizes,
    pub output: ResponseSizes,
}

/// Wait limits for every handshake poll loop. All fields absent means wait
/// forever without sleeping.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicyDef {
    #[default]
    Ignore,
    Saturate,
    Reject,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeModeDef {
    #[default]
    Flags,
    RoundTrip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TransportDef {
    Simulated {
        #[serde(default)]
        mode: HandshakeModeDef,
        #[serde(default)]
        ack_delay: usize,
        specimen: SpecimenDef,
    },
    Message {
        address: String,
        #[serde(default = "default_data_size")]
        data_size: usize,
    },
    SharedMemory {
        path: String,
        size_bytes: usize,
        #[serde(default)]
        base_offset: usize,
    },
}

fn default_data_size() -> usize {
    256
}

impl TransportDef {
    pub fn label(&self) -> &'static str {
        match self {
            TransportDef::Simulated { .. } => "simulated",
            TransportDef::Message { .. } => "message",
            TransportDef::SharedMemory { .. } => "shared memory",
        }
    }
}

/// Linear specimen behind a simulated controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SpecimenDef {
    /// Full gain matrix, one row per daq signal.
    Linear {
        rows: Vec<Vec<f64>>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bias: Vec<f64>,
    },
    /// Independent springs: daq i = k_i * ctrl i.
    Springs {
        stiffness: Vec<f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bias: Vec<f64>,
    },
}

impl SpecimenDef {
    /// (num_ctrl, num_daq) the specimen expects.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            SpecimenDef::Linear { rows, .. } => (rows.first().map_or(0, Vec::len), rows.len()),
            SpecimenDef::Springs { stiffness, .. } => (stiffness.len(), stiffness.len()),
        }
    }

    pub fn bias(&self) -> &[f64] {
        match self {
            SpecimenDef::Linear { bias, .. } | SpecimenDef::Springs { bias, .. } => bias,
        }
    }
}
