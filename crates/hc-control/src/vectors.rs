//! Per-response-type vectors exchanged with the simulation.
//!
//! Any slot may be absent when no signal of that type is routed.

use hc_core::ResponseType;

/// Trial vectors handed to [`crate::ExperimentalControl::drive_trial`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseVectors<'a> {
    slots: [Option<&'a [f64]>; ResponseType::COUNT],
}

impl<'a> ResponseVectors<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, response: ResponseType, values: &'a [f64]) -> Self {
        self.slots[response.index()] = Some(values);
        self
    }

    pub fn disp(self, values: &'a [f64]) -> Self {
        self.with(ResponseType::Disp, values)
    }

    pub fn vel(self, values: &'a [f64]) -> Self {
        self.with(ResponseType::Vel, values)
    }

    pub fn accel(self, values: &'a [f64]) -> Self {
        self.with(ResponseType::Accel, values)
    }

    pub fn force(self, values: &'a [f64]) -> Self {
        self.with(ResponseType::Force, values)
    }

    pub fn time(self, values: &'a [f64]) -> Self {
        self.with(ResponseType::Time, values)
    }

    pub fn get(&self, response: ResponseType) -> Option<&'a [f64]> {
        self.slots[response.index()]
    }
}

/// Output vectors filled by [`crate::ExperimentalControl::read_measured`].
///
/// Entries no signal maps to are left untouched.
#[derive(Debug, Default)]
pub struct ResponseVectorsMut<'a> {
    slots: [Option<&'a mut [f64]>; ResponseType::COUNT],
}

impl<'a> ResponseVectorsMut<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, response: ResponseType, values: &'a mut [f64]) -> Self {
        self.slots[response.index()] = Some(values);
        self
    }

    pub fn disp(self, values: &'a mut [f64]) -> Self {
        self.with(ResponseType::Disp, values)
    }

    pub fn vel(self, values: &'a mut [f64]) -> Self {
        self.with(ResponseType::Vel, values)
    }

    pub fn accel(self, values: &'a mut [f64]) -> Self {
        self.with(ResponseType::Accel, values)
    }

    pub fn force(self, values: &'a mut [f64]) -> Self {
        self.with(ResponseType::Force, values)
    }

    pub fn time(self, values: &'a mut [f64]) -> Self {
        self.with(ResponseType::Time, values)
    }

    pub fn len_of(&self, response: ResponseType) -> Option<usize> {
        self.slots[response.index()].as_ref().map(|v| v.len())
    }

    pub fn get_mut(&mut self, response: ResponseType) -> Option<&mut [f64]> {
        self.slots[response.index()].as_deref_mut()
    }
}
