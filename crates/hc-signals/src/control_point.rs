//! Control point definitions.
//!
//! A control point describes one physical measurement or actuation location
//! as an ordered list of scalar signals. Control points are built once from
//! configuration and are immutable afterwards; adapters hold shared
//! references obtained from a [`crate::ControlPointRegistry`].

use hc_core::{CpTag, ResponseType, Tag};
use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};

/// Physical limit pair for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub lower: f64,
    pub upper: f64,
}

impl Limits {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// `lower <= upper` with neither bound NaN. Infinite bounds are one-sided
    /// limits.
    pub fn is_ordered(&self) -> bool {
        self.lower <= self.upper
    }

    /// Nearest value inside the limits. Never panics, even on unordered
    /// bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Absolute/relative reference flags of one signal.
///
/// `false` everywhere means the signal is exchanged as an absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceFlags {
    /// Trial value is re-zeroed on the first driven step.
    #[serde(default)]
    pub trial: bool,
    /// Output value is reported relative to its initial reading.
    #[serde(default)]
    pub output: bool,
    /// Ctrl value is shifted by the matching measured value at setup.
    #[serde(default)]
    pub ctrl: bool,
    /// Daq value is re-zeroed at setup.
    #[serde(default)]
    pub daq: bool,
}

impl ReferenceFlags {
    pub fn is_absolute(&self) -> bool {
        !(self.trial || self.output || self.ctrl || self.daq)
    }
}

/// One scalar signal of a control point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDef {
    /// 0-based degree-of-freedom index.
    pub dof: usize,
    /// Response type carried by the signal.
    pub response: ResponseType,
    /// Scale factor between simulation units and controller units.
    pub factor: f64,
    /// Optional physical limits in controller units.
    pub limits: Option<Limits>,
    /// Reference flags.
    pub reference: ReferenceFlags,
}

impl SignalDef {
    /// Absolute signal with unit factor and no limits.
    pub fn new(dof: usize, response: ResponseType) -> Self {
        Self {
            dof,
            response,
            factor: 1.0,
            limits: None,
            reference: ReferenceFlags::default(),
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.limits = Some(Limits::new(lower, upper));
        self
    }

    pub fn with_reference(mut self, reference: ReferenceFlags) -> Self {
        self.reference = reference;
        self
    }
}

/// Node data a control point may be associated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub tag: Tag,
    /// Number of spatial dimensions.
    pub ndm: usize,
    /// Number of degrees of freedom.
    pub ndf: usize,
    #[serde(default)]
    pub coords: Vec<f64>,
}

/// Named collection of scalar signals for one location.
#[derive(Debug, Clone, Serialize)]
pub struct ControlPoint {
    tag: CpTag,
    signals: Vec<SignalDef>,
    node: Option<NodeInfo>,
}

impl ControlPoint {
    /// Create a control point from parallel dof and response arrays.
    ///
    /// Factors default to 1.0 and every signal is absolute.
    ///
    /// # Errors
    ///
    /// Returns error if the arrays are empty or differ in length.
    pub fn new(tag: CpTag, dofs: &[usize], responses: &[ResponseType]) -> SignalResult<Self> {
        if responses.len() != dofs.len() {
            return Err(SignalError::LengthMismatch {
                what: "response types",
                expected: dofs.len(),
                got: responses.len(),
            });
        }
        let signals = dofs
            .iter()
            .zip(responses)
            .map(|(&dof, &rsp)| SignalDef::new(dof, rsp))
            .collect();
        Self::from_signals(tag, signals)
    }

    /// Create a control point from raw integer response codes.
    ///
    /// # Errors
    ///
    /// Returns error if any code is outside the recognized response types.
    pub fn from_codes(tag: CpTag, dofs: &[usize], codes: &[i64]) -> SignalResult<Self> {
        let responses = codes
            .iter()
            .map(|&c| ResponseType::from_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tag, dofs, &responses)
    }

    /// Create a control point from fully specified signals.
    ///
    /// # Errors
    ///
    /// Returns error if no signals are given, a factor is not finite or
    /// zero, or a limit pair is inverted or NaN.
    pub fn from_signals(tag: CpTag, signals: Vec<SignalDef>) -> SignalResult<Self> {
        if signals.is_empty() {
            return Err(SignalError::EmptyControlPoint { tag });
        }
        for (index, sig) in signals.iter().enumerate() {
            if !sig.factor.is_finite() || sig.factor == 0.0 {
                return Err(SignalError::InvalidArg {
                    what: "factor must be finite and nonzero",
                });
            }
            if let Some(lim) = sig.limits {
                if !lim.is_ordered() {
                    return Err(SignalError::InvalidLimits {
                        index,
                        lower: lim.lower,
                        upper: lim.upper,
                    });
                }
            }
        }
        Ok(Self {
            tag,
            signals,
            node: None,
        })
    }

    /// Set per-signal scale factors.
    pub fn with_factors(mut self, factors: &[f64]) -> SignalResult<Self> {
        self.check_len("factors", factors.len())?;
        for (sig, &f) in self.signals.iter_mut().zip(factors) {
            if !f.is_finite() || f == 0.0 {
                return Err(SignalError::InvalidArg {
                    what: "factor must be finite and nonzero",
                });
            }
            sig.factor = f;
        }
        Ok(self)
    }

    /// Set per-signal lower and upper limits.
    pub fn with_limits(mut self, lower: &[f64], upper: &[f64]) -> SignalResult<Self> {
        self.check_len("lower limits", lower.len())?;
        self.check_len("upper limits", upper.len())?;
        for (index, (sig, (&lo, &hi))) in self
            .signals
            .iter_mut()
            .zip(lower.iter().zip(upper))
            .enumerate()
        {
            let lim = Limits::new(lo, hi);
            if !lim.is_ordered() {
                return Err(SignalError::InvalidLimits {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
            sig.limits = Some(lim);
        }
        Ok(self)
    }

    pub fn with_trial_reference(self, relative: &[bool]) -> SignalResult<Self> {
        self.with_flags("trial reference flags", relative, |r, v| r.trial = v)
    }

    pub fn with_output_reference(self, relative: &[bool]) -> SignalResult<Self> {
        self.with_flags("output reference flags", relative, |r, v| r.output = v)
    }

    pub fn with_ctrl_reference(self, relative: &[bool]) -> SignalResult<Self> {
        self.with_flags("ctrl reference flags", relative, |r, v| r.ctrl = v)
    }

    pub fn with_daq_reference(self, relative: &[bool]) -> SignalResult<Self> {
        self.with_flags("daq reference flags", relative, |r, v| r.daq = v)
    }

    /// Associate the control point with a node.
    ///
    /// # Errors
    ///
    /// Returns error if any signal's dof is not available on the node.
    pub fn with_node(mut self, node: NodeInfo) -> SignalResult<Self> {
        if let Some(sig) = self.signals.iter().find(|s| s.dof >= node.ndf) {
            return Err(SignalError::DofOutOfRange {
                tag: self.tag,
                dof: sig.dof,
                ndf: node.ndf,
            });
        }
        self.node = Some(node);
        Ok(self)
    }

    fn with_flags(
        mut self,
        what: &'static str,
        relative: &[bool],
        set: impl Fn(&mut ReferenceFlags, bool),
    ) -> SignalResult<Self> {
        self.check_len(what, relative.len())?;
        for (sig, &v) in self.signals.iter_mut().zip(relative) {
            set(&mut sig.reference, v);
        }
        Ok(self)
    }

    fn check_len(&self, what: &'static str, got: usize) -> SignalResult<()> {
        if got != self.signals.len() {
            return Err(SignalError::LengthMismatch {
                what,
                expected: self.signals.len(),
                got,
            });
        }
        Ok(())
    }

    pub fn tag(&self) -> CpTag {
        self.tag
    }

    pub fn signals(&self) -> &[SignalDef] {
        &self.signals
    }

    pub fn signal(&self, index: usize) -> Option<&SignalDef> {
        self.signals.get(index)
    }

    pub fn node(&self) -> Option<&NodeInfo> {
        self.node.as_ref()
    }

    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    /// Number of distinct dof indices referenced by the signals.
    pub fn num_unique_dofs(&self) -> usize {
        let mut dofs: Vec<usize> = self.signals.iter().map(|s| s.dof).collect();
        dofs.sort_unstable();
        dofs.dedup();
        dofs.len()
    }

    /// Count of signals per response type.
    pub fn size_per_response_type(&self) -> [usize; ResponseType::COUNT] {
        let mut sizes = [0; ResponseType::COUNT];
        for sig in &self.signals {
            sizes[sig.response.index()] += 1;
        }
        sizes
    }

    /// Which response types act on `dof`.
    pub fn dof_response_mask(&self, dof: usize) -> [bool; ResponseType::COUNT] {
        let mut mask = [false; ResponseType::COUNT];
        for sig in self.signals.iter().filter(|s| s.dof == dof) {
            mask[sig.response.index()] = true;
        }
        mask
    }

    /// True if every signal carries a limit pair.
    pub fn has_limits(&self) -> bool {
        self.signals.iter().all(|s| s.limits.is_some())
    }
}

impl AsRef<ControlPoint> for ControlPoint {
    fn as_ref(&self) -> &ControlPoint {
        self
    }
}

/// Two control points are equal when they address the same node, dofs and
/// response types. Factors, limits and reference flags are not compared.
impl PartialEq for ControlPoint {
    fn eq(&self, other: &Self) -> bool {
        self.node.as_ref().map(|n| n.tag) == other.node.as_ref().map(|n| n.tag)
            && self.signals.len() == other.signals.len()
            && self
                .signals
                .iter()
                .zip(&other.signals)
                .all(|(a, b)| a.dof == b.dof && a.response == b.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disp_force() -> ControlPoint {
        ControlPoint::new(
            Tag::new(1),
            &[0, 0, 1],
            &[ResponseType::Disp, ResponseType::Force, ResponseType::Disp],
        )
        .unwrap()
    }

    #[test]
    fn defaults_are_unit_factor_and_absolute() {
        let cp = disp_force();
        assert_eq!(cp.num_signals(), 3);
        assert!(cp.signals().iter().all(|s| s.factor == 1.0));
        assert!(cp.signals().iter().all(|s| s.reference.is_absolute()));
        assert!(!cp.has_limits());
    }

    #[test]
    fn derived_queries() {
        let cp = disp_force();
        assert_eq!(cp.num_unique_dofs(), 2);
        assert_eq!(cp.size_per_response_type(), [2, 0, 0, 1, 0]);
        assert_eq!(cp.dof_response_mask(0), [true, false, false, true, false]);
        assert_eq!(cp.dof_response_mask(1), [true, false, false, false, false]);
        assert_eq!(cp.dof_response_mask(5), [false; 5]);
    }

    #[test]
    fn empty_and_mismatched_rejected() {
        assert_eq!(
            ControlPoint::new(Tag::new(3), &[], &[]).unwrap_err(),
            SignalError::EmptyControlPoint { tag: Tag::new(3) }
        );
        assert!(matches!(
            ControlPoint::new(Tag::new(3), &[0, 1], &[ResponseType::Disp]),
            Err(SignalError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn unknown_response_code_rejected() {
        let err = ControlPoint::from_codes(Tag::new(1), &[0], &[7]).unwrap_err();
        assert!(matches!(err, SignalError::Core(_)));
        assert!(ControlPoint::from_codes(Tag::new(1), &[0, 0], &[0, 3]).is_ok());
    }

    #[test]
    fn limits_and_flags() {
        let cp = disp_force()
            .with_limits(&[-1.0, -10.0, -2.0], &[1.0, 10.0, 2.0])
            .unwrap()
            .with_ctrl_reference(&[true, false, false])
            .unwrap()
            .with_daq_reference(&[false, true, false])
            .unwrap();
        assert!(cp.has_limits());
        assert!(cp.signals()[0].reference.ctrl);
        assert!(cp.signals()[1].reference.daq);
        assert!(!cp.signals()[2].reference.trial);

        let err = disp_force()
            .with_limits(&[1.0, 0.0, 0.0], &[0.0, 1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidLimits { index: 0, .. }));
    }

    #[test]
    fn nan_limits_rejected() {
        let err = ControlPoint::new(Tag::new(1), &[0, 1], &[ResponseType::Disp, ResponseType::Disp])
            .unwrap()
            .with_limits(&[f64::NAN, -1.0], &[1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidLimits { index: 0, .. }));

        let sig = SignalDef::new(0, ResponseType::Disp).with_limits(-1.0, f64::NAN);
        assert!(matches!(
            ControlPoint::from_signals(Tag::new(2), vec![sig]),
            Err(SignalError::InvalidLimits { index: 0, .. })
        ));

        let one_sided = SignalDef::new(0, ResponseType::Disp).with_limits(f64::NEG_INFINITY, 2.0);
        assert!(ControlPoint::from_signals(Tag::new(3), vec![one_sided]).is_ok());
    }

    #[test]
    fn clamp_is_total() {
        let lim = Limits::new(-1.0, 1.0);
        assert_eq!(lim.clamp(3.0), 1.0);
        assert_eq!(lim.clamp(-3.0), -1.0);
        assert_eq!(Limits::new(f64::NAN, 1.0).clamp(3.0), 1.0);
        assert_eq!(Limits::new(f64::NEG_INFINITY, 1.0).clamp(-5.0), -5.0);
    }

    #[test]
    fn zero_factor_rejected() {
        assert!(disp_force().with_factors(&[1.0, 0.0, 2.0]).is_err());
        let cp = disp_force().with_factors(&[1.0, 1.0, 2.0]).unwrap();
        assert_eq!(cp.signals()[2].factor, 2.0);
    }

    #[test]
    fn node_association_checks_dofs() {
        let node = NodeInfo {
            tag: Tag::new(10),
            ndm: 2,
            ndf: 1,
            coords: vec![0.0, 0.0],
        };
        let err = disp_force().with_node(node.clone()).unwrap_err();
        assert_eq!(
            err,
            SignalError::DofOutOfRange {
                tag: Tag::new(1),
                dof: 1,
                ndf: 1
            }
        );

        let wide = NodeInfo { ndf: 3, ..node };
        let cp = disp_force().with_node(wide).unwrap();
        assert_eq!(cp.node().map(|n| n.tag), Some(Tag::new(10)));
    }

    #[test]
    fn equality_ignores_factors() {
        let a = disp_force();
        let b = disp_force().with_factors(&[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(a, b);
        let c = ControlPoint::new(Tag::new(1), &[0], &[ResponseType::Disp]).unwrap();
        assert_ne!(a, c);
    }
}
