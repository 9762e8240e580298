//! The experimental control adapter.
//!
//! One generic adapter composes the signal maps, offset tracker, filter
//! banks and handshake over any [`Transport`]. The transport is shared
//! between copies of an adapter; signal buffers and offsets are not.
//!
//! Lifecycle:
//!
//! ```text
//! Created --configure_sizes--> Sized --setup--> Running
//!    any transport failure --> Faulted (terminal)
//! ```

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use hc_core::{ControlTag, ResponseSizes, ResponseType, ensure_all_finite, ensure_finite};
use hc_signals::{ControlPoint, FilterBank, OffsetTracker, SignalError, SignalFilter, SignalMap};
use hc_transport::{
    CancelToken, HandshakeProtocol, HandshakeStats, PollOptions, Transport, TransportError,
    TransportResult, TransportSizes,
};
use tracing::{debug, info, warn};

use crate::error::{ControlError, ControlResult};
use crate::limits::LimitPolicy;
use crate::vectors::{ResponseVectors, ResponseVectorsMut};

/// Transport handle shared by adapter copies.
pub type Shared<T> = Rc<RefCell<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Sized,
    Running,
    Faulted,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Created => "created",
            Lifecycle::Sized => "sized",
            Lifecycle::Running => "running",
            Lifecycle::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Trial and output sizes agreed in [`ExperimentalControl::configure_sizes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguredSizes {
    pub trial: ResponseSizes,
    pub output: ResponseSizes,
}

pub struct ExperimentalControl<T: Transport> {
    tag: ControlTag,
    transport: Shared<T>,
    trial_points: Vec<Rc<ControlPoint>>,
    output_points: Vec<Rc<ControlPoint>>,
    trial_map: SignalMap,
    output_map: SignalMap,
    ctrl_filters: FilterBank,
    daq_filters: FilterBank,
    limit_policy: LimitPolicy,
    handshake: HandshakeProtocol,
    sizes: Option<ConfiguredSizes>,
    ctrl_signal: Vec<f64>,
    daq_signal: Vec<f64>,
    offsets: OffsetTracker,
    state: Lifecycle,
}

impl<T: Transport> fmt::Debug for ExperimentalControl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentalControl")
            .field("tag", &self.tag)
            .field("state", &self.state)
            .field("num_ctrl_signals", &self.trial_map.len())
            .field("num_daq_signals", &self.output_map.len())
            .field("limit_policy", &self.limit_policy)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> ExperimentalControl<T> {
    /// Adapter owning a fresh transport.
    pub fn new(
        tag: ControlTag,
        transport: T,
        trial_points: Vec<Rc<ControlPoint>>,
        output_points: Vec<Rc<ControlPoint>>,
    ) -> ControlResult<Self> {
        Self::with_shared(tag, Rc::new(RefCell::new(transport)), trial_points, output_points)
    }

    /// Adapter on a transport that other adapters may also use.
    ///
    /// # Errors
    ///
    /// Returns error if either control point list is empty.
    pub fn with_shared(
        tag: ControlTag,
        transport: Shared<T>,
        trial_points: Vec<Rc<ControlPoint>>,
        output_points: Vec<Rc<ControlPoint>>,
    ) -> ControlResult<Self> {
        if trial_points.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "at least one trial control point is required",
            });
        }
        if output_points.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "at least one output control point is required",
            });
        }
        let trial_map = SignalMap::new(&trial_points);
        let output_map = SignalMap::new(&output_points);
        let offsets = OffsetTracker::new(&[], 0);
        Ok(Self {
            tag,
            transport,
            trial_points,
            output_points,
            trial_map,
            output_map,
            ctrl_filters: FilterBank::new(),
            daq_filters: FilterBank::new(),
            limit_policy: LimitPolicy::default(),
            handshake: HandshakeProtocol::default(),
            sizes: None,
            ctrl_signal: Vec::new(),
            daq_signal: Vec::new(),
            offsets,
            state: Lifecycle::Created,
        })
    }

    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        let cancel = self.handshake.cancel_token().clone();
        self.handshake = HandshakeProtocol::new(options, cancel);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        let options = *self.handshake.options();
        self.handshake = HandshakeProtocol::new(options, cancel);
        self
    }

    pub fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    /// Filter applied to outgoing values of `response`.
    pub fn with_ctrl_filter(mut self, response: ResponseType, filter: Box<dyn SignalFilter>) -> Self {
        self.ctrl_filters.set(response, filter);
        self
    }

    /// Filter applied to incoming values of `response`.
    pub fn with_daq_filter(mut self, response: ResponseType, filter: Box<dyn SignalFilter>) -> Self {
        self.daq_filters.set(response, filter);
        self
    }

    pub fn tag(&self) -> ControlTag {
        self.tag
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn limit_policy(&self) -> LimitPolicy {
        self.limit_policy
    }

    pub fn trial_points(&self) -> &[Rc<ControlPoint>] {
        &self.trial_points
    }

    pub fn output_points(&self) -> &[Rc<ControlPoint>] {
        &self.output_points
    }

    pub fn trial_map(&self) -> &SignalMap {
        &self.trial_map
    }

    pub fn output_map(&self) -> &SignalMap {
        &self.output_map
    }

    pub fn num_ctrl_signals(&self) -> usize {
        self.trial_map.len()
    }

    pub fn num_daq_signals(&self) -> usize {
        self.output_map.len()
    }

    pub fn sizes(&self) -> Option<ConfiguredSizes> {
        self.sizes
    }

    pub fn ctrl_filters(&self) -> &FilterBank {
        &self.ctrl_filters
    }

    pub fn daq_filters(&self) -> &FilterBank {
        &self.daq_filters
    }

    pub fn handshake_stats(&self) -> HandshakeStats {
        self.handshake.stats()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        self.handshake.cancel_token()
    }

    /// Handle to the shared transport.
    pub fn transport(&self) -> Shared<T> {
        Rc::clone(&self.transport)
    }

    pub(crate) fn offsets(&self) -> &OffsetTracker {
        &self.offsets
    }

    pub(crate) fn ctrl_buffer(&self) -> &[f64] {
        &self.ctrl_signal
    }

    pub(crate) fn daq_buffer(&self) -> &[f64] {
        &self.daq_signal
    }

    /// Validate the caller's sizes against what the control points use.
    ///
    /// # Errors
    ///
    /// Returns [`hc_signals::SignalError::SizeShortfall`] if any offered size is smaller
    /// than the largest dof a signal of that type references.
    pub fn configure_sizes(&mut self, trial: ResponseSizes, output: ResponseSizes) -> ControlResult<()> {
        self.expect_state("configure sizes", Lifecycle::Created)?;
        self.trial_map.validate_sizes(&trial)?;
        self.output_map.validate_sizes(&output)?;
        self.sizes = Some(ConfiguredSizes { trial, output });
        self.state = Lifecycle::Sized;
        debug!(control = %self.tag, trial = %trial, output = %output, "sizes configured");
        Ok(())
    }

    /// Let the control points dictate the sizes.
    pub fn configure_sizes_from_points(&mut self) -> ControlResult<ConfiguredSizes> {
        let trial = self.trial_map.required_sizes();
        let output = self.output_map.required_sizes();
        self.configure_sizes(trial, output)?;
        Ok(ConfiguredSizes { trial, output })
    }

    /// Connect, calibrate relative offsets and arm the controller.
    ///
    /// Allocates the signal buffers, runs one acquire cycle, captures ctrl
    /// and daq offsets from that measurement, then sends the seeded ctrl
    /// array once.
    pub fn setup(&mut self) -> ControlResult<()> {
        self.expect_state("setup", Lifecycle::Sized)?;
        let sizes = self.sizes.ok_or(ControlError::State {
            tag: self.tag,
            op: "setup",
            state: self.state,
        })?;

        let num_ctrl = self.trial_map.len();
        let num_daq = self.output_map.len();
        self.ctrl_signal = vec![0.0; num_ctrl];
        self.daq_signal = vec![0.0; num_daq];
        self.offsets = OffsetTracker::new(self.trial_map.descriptors(), num_daq);

        let transport_sizes = TransportSizes {
            ctrl: sizes.trial,
            daq: sizes.output,
            num_ctrl_signals: num_ctrl,
            num_daq_signals: num_daq,
        };
        let result = {
            let mut transport = borrow_shared(&self.transport, self.tag)?;
            calibrate(
                &mut *transport,
                &mut self.handshake,
                &transport_sizes,
                &mut self.daq_signal,
            )
        };
        if let Err(e) = result {
            return Err(self.fault("setup", e));
        }
        info!(control = %self.tag, daq = ?self.daq_signal, "initial daq signals");

        self.offsets.capture_ctrl_offset_from_daq(
            self.trial_map.descriptors(),
            self.output_map.descriptors(),
            &self.daq_signal,
            &mut self.ctrl_signal,
        );
        self.offsets
            .capture_daq_offset_from_initial(self.output_map.descriptors(), &self.daq_signal);

        let result = {
            let mut transport = borrow_shared(&self.transport, self.tag)?;
            self.handshake.control(&mut *transport, &self.ctrl_signal)
        };
        if let Err(e) = result {
            return Err(self.fault("setup", e));
        }

        self.state = Lifecycle::Running;
        info!(
            control = %self.tag,
            transport = self.transport_name(),
            num_ctrl,
            num_daq,
            "experimental control running"
        );
        Ok(())
    }

    /// Route the trial vectors to the controller and wait for acceptance.
    ///
    /// Vectors for response types no trial signal uses may be absent. The
    /// batch is staged on copies of the offsets and ctrl filters; a
    /// non-finite or rejected value leaves both untouched.
    pub fn drive_trial(&mut self, trial: &ResponseVectors<'_>) -> ControlResult<()> {
        self.expect_state("drive trial", Lifecycle::Running)?;
        let sizes = self.running_sizes("drive trial")?;
        for (slot, d) in self.trial_map.descriptors().iter().enumerate() {
            check_vector(d.response, slot, trial.get(d.response).map(<[f64]>::len), sizes.trial)?;
        }

        let raw: Vec<f64> = self
            .trial_map
            .descriptors()
            .iter()
            .map(|d| d.factor * trial.get(d.response).map_or(0.0, |v| v[d.dof]))
            .collect();
        ensure_all_finite(&raw, "trial signal").map_err(SignalError::from)?;

        let mut offsets = self.offsets.clone();
        let mut filters = self.ctrl_filters.clone();
        let mut staged = Vec::with_capacity(raw.len());
        for (slot, (d, &value)) in self.trial_map.descriptors().iter().zip(&raw).enumerate() {
            let value = offsets.apply_outgoing(value, slot, d.response, &mut filters);
            let value = ensure_finite(value, "ctrl signal").map_err(SignalError::from)?;
            staged.push(self.limit_policy.enforce(slot, value, d.limits)?);
        }
        offsets.end_trial_batch();
        self.offsets = offsets;
        self.ctrl_filters = filters;
        self.ctrl_signal.copy_from_slice(&staged);

        let result = {
            let mut transport = borrow_shared(&self.transport, self.tag)?;
            self.handshake.control(&mut *transport, &self.ctrl_signal)
        };
        result.map_err(|e| self.fault("drive trial", e))
    }

    /// Wait for the controller, then scatter measured values into `output`.
    ///
    /// Absent output vectors are skipped, and entries no output signal maps
    /// to are left untouched. Daq filters still see every measured value.
    pub fn read_measured(&mut self, output: &mut ResponseVectorsMut<'_>) -> ControlResult<()> {
        self.expect_state("read measured", Lifecycle::Running)?;
        let sizes = self.running_sizes("read measured")?;
        for d in self.output_map.descriptors() {
            if let Some(got) = output.len_of(d.response) {
                check_length(d.response, got, sizes.output)?;
            }
        }

        let result = {
            let mut transport = borrow_shared(&self.transport, self.tag)?;
            self.handshake.acquire(&mut *transport, &mut self.daq_signal)
        };
        if let Err(e) = result {
            return Err(self.fault("read measured", e));
        }

        for (slot, d) in self.output_map.descriptors().iter().enumerate() {
            let value =
                self.offsets
                    .apply_incoming(self.daq_signal[slot], slot, d.response, &mut self.daq_filters);
            if let Some(target) = output.get_mut(d.response) {
                target[d.dof] = value / d.factor;
            }
        }
        Ok(())
    }

    /// Commit the converged step: filter hooks, then the transport.
    pub fn commit(&mut self) -> ControlResult<()> {
        self.expect_state("commit", Lifecycle::Running)?;
        self.ctrl_filters.update_all();
        self.daq_filters.update_all();
        let result = self.borrow_transport()?.commit();
        result.map_err(|e| self.fault("commit", e))
    }

    /// Copy sharing the transport and control points.
    ///
    /// Filters are cloned; buffers and offsets start empty, so the copy has
    /// to run [`ExperimentalControl::setup`] itself.
    pub fn get_copy(&self) -> Self {
        let state = match self.sizes {
            Some(_) => Lifecycle::Sized,
            None => Lifecycle::Created,
        };
        Self {
            tag: self.tag,
            transport: Rc::clone(&self.transport),
            trial_points: self.trial_points.clone(),
            output_points: self.output_points.clone(),
            trial_map: self.trial_map.clone(),
            output_map: self.output_map.clone(),
            ctrl_filters: self.ctrl_filters.clone(),
            daq_filters: self.daq_filters.clone(),
            limit_policy: self.limit_policy,
            handshake: HandshakeProtocol::new(
                *self.handshake.options(),
                self.handshake.cancel_token().clone(),
            ),
            sizes: self.sizes,
            ctrl_signal: Vec::new(),
            daq_signal: Vec::new(),
            offsets: OffsetTracker::new(&[], 0),
            state,
        }
    }

    /// Disconnect the transport for every copy and stop this adapter.
    pub fn shutdown(&mut self) -> ControlResult<()> {
        let result = self.borrow_transport()?.disconnect();
        self.state = Lifecycle::Faulted;
        result.map_err(|source| ControlError::Transport {
            tag: self.tag,
            op: "shutdown",
            source,
        })
    }

    fn expect_state(&self, op: &'static str, expected: Lifecycle) -> ControlResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ControlError::State {
                tag: self.tag,
                op,
                state: self.state,
            })
        }
    }

    fn running_sizes(&self, op: &'static str) -> ControlResult<ConfiguredSizes> {
        self.sizes.ok_or(ControlError::State {
            tag: self.tag,
            op,
            state: self.state,
        })
    }

    fn borrow_transport(&self) -> ControlResult<RefMut<'_, T>> {
        borrow_shared(&self.transport, self.tag)
    }

    fn transport_name(&self) -> &'static str {
        self.transport
            .try_borrow()
            .map(|t| t.name())
            .unwrap_or("busy")
    }

    /// Mark the adapter faulted and release the transport.
    fn fault(&mut self, op: &'static str, source: TransportError) -> ControlError {
        warn!(control = %self.tag, op, error = %source, "transport failure, adapter faulted");
        self.state = Lifecycle::Faulted;
        if let Ok(mut transport) = self.transport.try_borrow_mut() {
            if let Err(e) = transport.disconnect() {
                warn!(control = %self.tag, error = %e, "disconnect after failure also failed");
            }
        }
        ControlError::Transport {
            tag: self.tag,
            op,
            source,
        }
    }
}

impl<T: Transport> Drop for ExperimentalControl<T> {
    fn drop(&mut self) {
        if Rc::strong_count(&self.transport) > 1 {
            return;
        }
        if let Ok(mut transport) = self.transport.try_borrow_mut() {
            if transport.is_connected() {
                if let Err(e) = transport.disconnect() {
                    warn!(control = %self.tag, error = %e, "disconnect on drop failed");
                }
            }
        }
    }
}

fn borrow_shared<T>(transport: &Shared<T>, tag: ControlTag) -> ControlResult<RefMut<'_, T>> {
    transport
        .try_borrow_mut()
        .map_err(|_| ControlError::Busy { tag })
}

/// Connect, announce sizes and take the first measurement.
fn calibrate<T: Transport + ?Sized>(
    transport: &mut T,
    handshake: &mut HandshakeProtocol,
    sizes: &TransportSizes,
    daq: &mut [f64],
) -> TransportResult<()> {
    transport.connect()?;
    transport.configure(sizes)?;
    handshake.acquire(transport, daq)
}

fn check_vector(
    response: ResponseType,
    slot: usize,
    len: Option<usize>,
    sizes: ResponseSizes,
) -> ControlResult<()> {
    match len {
        None => Err(ControlError::MissingVector { response, slot }),
        Some(got) => check_length(response, got, sizes),
    }
}

fn check_length(response: ResponseType, got: usize, sizes: ResponseSizes) -> ControlResult<()> {
    let expected = sizes.get(response);
    if got == expected {
        Ok(())
    } else {
        Err(ControlError::VectorSize {
            response,
            expected,
            got,
        })
    }
}
