//! Registry of control points keyed by tag.
//!
//! Control points are shared, not copied: several adapters may reference the
//! same control point, so the registry hands out `Rc` handles.

use std::collections::BTreeMap;
use std::rc::Rc;

use hc_core::CpTag;

use crate::control_point::ControlPoint;
use crate::error::{SignalError, SignalResult};

#[derive(Debug, Default, Clone)]
pub struct ControlPointRegistry {
    points: BTreeMap<CpTag, Rc<ControlPoint>>,
}

impl ControlPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a control point under its own tag.
    ///
    /// # Errors
    ///
    /// Returns error if the tag is already taken.
    pub fn add(&mut self, point: ControlPoint) -> SignalResult<Rc<ControlPoint>> {
        let tag = point.tag();
        if self.points.contains_key(&tag) {
            return Err(SignalError::DuplicateTag { tag });
        }
        let shared = Rc::new(point);
        self.points.insert(tag, Rc::clone(&shared));
        Ok(shared)
    }

    pub fn get(&self, tag: CpTag) -> Option<Rc<ControlPoint>> {
        self.points.get(&tag).cloned()
    }

    /// Remove a control point. Adapters holding a handle keep it alive.
    pub fn remove(&mut self, tag: CpTag) -> Option<Rc<ControlPoint>> {
        self.points.remove(&tag)
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = CpTag> + '_ {
        self.points.keys().copied()
    }

    /// Resolve a tag list into handles, preserving the given order.
    ///
    /// # Errors
    ///
    /// Returns error on the first tag that is not registered.
    pub fn resolve(&self, tags: &[CpTag]) -> SignalResult<Vec<Rc<ControlPoint>>> {
        tags.iter()
            .map(|&tag| self.get(tag).ok_or(SignalError::MissingControlPoint { tag }))
            .collect()
    }
}
