//! Flattening of control point lists into flat signal arrays.
//!
//! The descriptor order produced here (control points in list order, then
//! signals in declaration order) is the index correspondence between the
//! flat ctrl/daq arrays, the offset vectors and the remote controller.

use hc_core::{CpTag, ResponseSizes, ResponseType};
use serde::{Deserialize, Serialize};

use crate::control_point::{ControlPoint, Limits, ReferenceFlags};
use crate::error::{SignalError, SignalResult};

/// One slot of a flat signal array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Control point the signal came from.
    pub cp: CpTag,
    pub dof: usize,
    pub response: ResponseType,
    pub factor: f64,
    pub limits: Option<Limits>,
    pub reference: ReferenceFlags,
}

/// Flatten control points into descriptors, list order then signal order.
///
/// The number of signals is the length of the returned vector.
pub fn flatten_signals<P: AsRef<ControlPoint>>(points: &[P]) -> Vec<SignalDescriptor> {
    points
        .iter()
        .flat_map(|p| {
            let cp = p.as_ref();
            cp.signals().iter().map(move |s| SignalDescriptor {
                cp: cp.tag(),
                dof: s.dof,
                response: s.response,
                factor: s.factor,
                limits: s.limits,
                reference: s.reference,
            })
        })
        .collect()
}

/// Largest 1-based dof index referenced per response type.
///
/// A response type no signal uses reports zero.
pub fn max_dof_per_response_type<P: AsRef<ControlPoint>>(points: &[P]) -> ResponseSizes {
    let mut sizes = ResponseSizes::zero();
    for sig in points.iter().flat_map(|p| p.as_ref().signals()) {
        let needed = sig.dof + 1;
        if needed > sizes[sig.response] {
            sizes[sig.response] = needed;
        }
    }
    sizes
}

/// Flattened view of a control point list.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMap {
    descriptors: Vec<SignalDescriptor>,
    required: ResponseSizes,
}

impl SignalMap {
    pub fn new<P: AsRef<ControlPoint>>(points: &[P]) -> Self {
        Self {
            descriptors: flatten_signals(points),
            required: max_dof_per_response_type(points),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[SignalDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, slot: usize) -> Option<&SignalDescriptor> {
        self.descriptors.get(slot)
    }

    /// Sizes implied by the control points (see [`max_dof_per_response_type`]).
    pub fn required_sizes(&self) -> ResponseSizes {
        self.required
    }

    /// First slot carrying `(dof, response)`.
    pub fn find(&self, dof: usize, response: ResponseType) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|d| d.dof == dof && d.response == response)
    }

    /// Check that `offered` covers every response type the signals use.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::SizeShortfall`] for the first response type
    /// whose offered size is smaller than the largest dof referenced.
    pub fn validate_sizes(&self, offered: &ResponseSizes) -> SignalResult<()> {
        match offered.first_shortfall(&self.required) {
            Some(response) => Err(SignalError::SizeShortfall {
                response,
                required: self.required.get(response),
                offered: offered.get(response),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::Tag;
    use std::rc::Rc;

    fn scenario_points() -> Vec<Rc<ControlPoint>> {
        let first = ControlPoint::new(
            Tag::new(1),
            &[0, 0],
            &[ResponseType::Disp, ResponseType::Force],
        )
        .unwrap();
        let second = ControlPoint::new(Tag::new(2), &[1], &[ResponseType::Disp])
            .unwrap()
            .with_factors(&[2.0])
            .unwrap();
        vec![Rc::new(first), Rc::new(second)]
    }

    #[test]
    fn two_point_flattening_order() {
        let descs = flatten_signals(&scenario_points());
        let got: Vec<(usize, ResponseType, f64)> =
            descs.iter().map(|d| (d.dof, d.response, d.factor)).collect();
        assert_eq!(
            got,
            vec![
                (0, ResponseType::Disp, 1.0),
                (0, ResponseType::Force, 1.0),
                (1, ResponseType::Disp, 2.0),
            ]
        );
        assert_eq!(descs[2].cp, Tag::new(2));
    }

    #[test]
    fn two_point_max_dofs() {
        let sizes = max_dof_per_response_type(&scenario_points());
        assert_eq!(sizes.get(ResponseType::Disp), 2);
        assert_eq!(sizes.get(ResponseType::Force), 1);
        assert_eq!(sizes.get(ResponseType::Vel), 0);
        assert_eq!(sizes.get(ResponseType::Time), 0);
    }

    #[test]
    fn find_returns_first_match() {
        let map = SignalMap::new(&scenario_points());
        assert_eq!(map.find(0, ResponseType::Force), Some(1));
        assert_eq!(map.find(1, ResponseType::Disp), Some(2));
        assert_eq!(map.find(1, ResponseType::Force), None);
    }

    #[test]
    fn undersized_offer_rejected() {
        let map = SignalMap::new(&scenario_points());
        let offered = ResponseSizes::zero()
            .with(ResponseType::Disp, 1)
            .with(ResponseType::Force, 1);
        assert_eq!(
            map.validate_sizes(&offered).unwrap_err(),
            SignalError::SizeShortfall {
                response: ResponseType::Disp,
                required: 2,
                offered: 1
            }
        );

        let offered = offered.with(ResponseType::Disp, 3);
        assert!(map.validate_sizes(&offered).is_ok());
    }
}
