//! Per-response-type signal filters.
//!
//! Filtering algorithms are collaborators of the adapter: the routing code
//! only calls [`SignalFilter::filter`] on each value of a response type that
//! has a filter configured. Two small filters are provided for error
//! simulation and calibration.

use std::fmt;

use hc_core::{FilterTag, ResponseType};

/// Stateful scalar transform applied to every value of one response type.
pub trait SignalFilter: fmt::Debug {
    /// Transform one value.
    fn filter(&mut self, value: f64) -> f64;

    /// Commit hook, called once per converged simulation step.
    fn update(&mut self) {}

    /// Tag the filter was registered under, if any.
    fn tag(&self) -> Option<FilterTag> {
        None
    }

    /// Clone into a new box (adapter copies own their filters).
    fn box_clone(&self) -> Box<dyn SignalFilter>;
}

impl Clone for Box<dyn SignalFilter> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// One optional filter slot per response type.
#[derive(Debug, Clone, Default)]
pub struct FilterBank {
    slots: [Option<Box<dyn SignalFilter>>; ResponseType::COUNT],
}

impl FilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a filter, replacing any previous one for the same type.
    pub fn set(&mut self, response: ResponseType, filter: Box<dyn SignalFilter>) {
        self.slots[response.index()] = Some(filter);
    }

    pub fn clear(&mut self, response: ResponseType) {
        self.slots[response.index()] = None;
    }

    pub fn has(&self, response: ResponseType) -> bool {
        self.slots[response.index()].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Filter `value` if a filter exists for `response`, else pass through.
    pub fn apply(&mut self, response: ResponseType, value: f64) -> f64 {
        match &mut self.slots[response.index()] {
            Some(f) => f.filter(value),
            None => value,
        }
    }

    /// Call [`SignalFilter::update`] on every installed filter.
    pub fn update_all(&mut self) {
        for f in self.slots.iter_mut().flatten() {
            f.update();
        }
    }

    /// Filter tags in response-type order (recorder output).
    pub fn tags(&self) -> [Option<FilterTag>; ResponseType::COUNT] {
        let mut tags = [None; ResponseType::COUNT];
        for (slot, f) in tags.iter_mut().zip(&self.slots) {
            *slot = f.as_ref().and_then(|f| f.tag());
        }
        tags
    }
}

/// Constant gain.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleFilter {
    pub gain: f64,
    tag: Option<FilterTag>,
}

impl ScaleFilter {
    pub fn new(gain: f64) -> Self {
        Self { gain, tag: None }
    }

    pub fn tagged(mut self, tag: FilterTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

impl SignalFilter for ScaleFilter {
    fn filter(&mut self, value: f64) -> f64 {
        self.gain * value
    }

    fn tag(&self) -> Option<FilterTag> {
        self.tag
    }

    fn box_clone(&self) -> Box<dyn SignalFilter> {
        Box::new(self.clone())
    }
}

/// Undershoot error simulation.
///
/// Moves each value back toward the previous one by a fixed amount: the
/// amount is subtracted when the signal increases and added when it
/// decreases. Values within 1e-6 of zero get the amount added as well.
#[derive(Debug, Clone, PartialEq)]
pub struct Undershoot {
    pub amount: f64,
    previous: f64,
    tag: Option<FilterTag>,
}

impl Undershoot {
    pub fn new(amount: f64) -> Self {
        Self {
            amount,
            previous: 0.0,
            tag: None,
        }
    }

    pub fn tagged(mut self, tag: FilterTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

impl SignalFilter for Undershoot {
    fn filter(&mut self, value: f64) -> f64 {
        let mut out = value;
        if value > self.previous {
            out -= self.amount;
        } else if value < self.previous {
            out += self.amount;
        }
        if value.abs() < 1.0e-6 {
            out += self.amount;
        }
        self.previous = value;
        out
    }

    fn tag(&self) -> Option<FilterTag> {
        self.tag
    }

    fn box_clone(&self) -> Box<dyn SignalFilter> {
        Box::new(self.clone())
    }
}
