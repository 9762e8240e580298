//! Signal offset bookkeeping.
//!
//! Three offset vectors are kept per adapter, all sized once from the
//! flattened signal maps:
//!
//! - **trial** (one per ctrl slot): captured on the first driven batch for
//!   slots flagged relative-trial, as the negated first nonzero value
//! - **ctrl** (one per ctrl slot): captured at setup from the measured value
//!   of the matching output signal, for slots flagged relative-ctrl
//! - **daq** (one per daq slot): captured at setup as the negated initial
//!   measurement, for slots flagged relative-daq
//!
//! Outgoing values go through trial offset, filter, ctrl offset. Incoming
//! values go through daq offset, filter.

use hc_core::ResponseType;
use tracing::{info, warn};

use crate::filter::FilterBank;
use crate::signal_map::SignalDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetTracker {
    trial: Vec<f64>,
    ctrl: Vec<f64>,
    daq: Vec<f64>,
    relative_trial: Vec<bool>,
    got_relative_trial: bool,
}

impl OffsetTracker {
    /// Zeroed offsets for the given ctrl descriptors and daq slot count.
    pub fn new(ctrl: &[SignalDescriptor], num_daq: usize) -> Self {
        Self {
            trial: vec![0.0; ctrl.len()],
            ctrl: vec![0.0; ctrl.len()],
            daq: vec![0.0; num_daq],
            relative_trial: ctrl.iter().map(|d| d.reference.trial).collect(),
            got_relative_trial: false,
        }
    }

    pub fn trial_offsets(&self) -> &[f64] {
        &self.trial
    }

    pub fn ctrl_offsets(&self) -> &[f64] {
        &self.ctrl
    }

    pub fn daq_offsets(&self) -> &[f64] {
        &self.daq
    }

    /// True once the first trial batch has completed.
    pub fn got_relative_trial(&self) -> bool {
        self.got_relative_trial
    }

    /// Correct one outgoing value for ctrl slot `slot`.
    ///
    /// Until the first batch has been closed with
    /// [`OffsetTracker::end_trial_batch`], a nonzero value on a
    /// relative-trial slot sets that slot's trial offset to its negation.
    pub fn apply_outgoing(
        &mut self,
        raw: f64,
        slot: usize,
        response: ResponseType,
        filters: &mut FilterBank,
    ) -> f64 {
        if !self.got_relative_trial && self.relative_trial[slot] && raw != 0.0 {
            self.trial[slot] = -raw;
        }
        let value = raw + self.trial[slot];
        let value = filters.apply(response, value);
        value + self.ctrl[slot]
    }

    /// Close the current trial batch; trial offsets are frozen afterwards.
    pub fn end_trial_batch(&mut self) {
        if self.got_relative_trial {
            return;
        }
        for (slot, &offset) in self.trial.iter().enumerate() {
            if offset != 0.0 {
                info!(slot = slot + 1, offset, "captured trial signal offset");
            }
        }
        self.got_relative_trial = true;
    }

    /// Correct one incoming value for daq slot `slot`.
    pub fn apply_incoming(
        &self,
        raw: f64,
        slot: usize,
        response: ResponseType,
        filters: &mut FilterBank,
    ) -> f64 {
        let value = raw + self.daq[slot];
        filters.apply(response, value)
    }

    /// Seed ctrl offsets for relative-ctrl slots from the setup measurement.
    ///
    /// For each relative-ctrl trial descriptor, the first output descriptor
    /// with the same `(dof, response)` supplies its initial measured value,
    /// which becomes both the ctrl offset and the current ctrl signal. A
    /// relative slot without a match keeps a zero offset.
    ///
    /// Returns the ctrl slots that found no match.
    pub fn capture_ctrl_offset_from_daq(
        &mut self,
        trial: &[SignalDescriptor],
        output: &[SignalDescriptor],
        initial_daq: &[f64],
        ctrl_signal: &mut [f64],
    ) -> Vec<usize> {
        let mut unmatched = Vec::new();
        for (kt, t) in trial.iter().enumerate() {
            if !t.reference.ctrl {
                continue;
            }
            let matched = output
                .iter()
                .position(|o| o.dof == t.dof && o.response == t.response);
            match matched {
                Some(ko) => {
                    self.ctrl[kt] = initial_daq[ko];
                    ctrl_signal[kt] = initial_daq[ko];
                    info!(slot = kt + 1, offset = self.ctrl[kt], "captured ctrl signal offset");
                }
                None => {
                    warn!(
                        slot = kt + 1,
                        cp = %t.cp,
                        dof = t.dof,
                        response = %t.response,
                        "relative ctrl signal has no matching output signal; offset left at zero"
                    );
                    unmatched.push(kt);
                }
            }
        }
        unmatched
    }

    /// Seed daq offsets for relative-daq slots as the negated initial value.
    pub fn capture_daq_offset_from_initial(
        &mut self,
        output: &[SignalDescriptor],
        initial_daq: &[f64],
    ) {
        for (ko, o) in output.iter().enumerate() {
            if o.reference.daq {
                self.daq[ko] = -initial_daq[ko];
                info!(slot = ko + 1, offset = self.daq[ko], "captured daq signal offset");
            }
        }
    }
}
