//! In-process simulated controller.
//!
//! Answers the flag handshake itself after a configurable number of polls
//! and computes daq signals from a [`Specimen`]. Useful for dry runs of a
//! hybrid test and for exercising adapters without hardware.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::transport::{Flag, HandshakeMode, Transport, TransportSizes};

/// Test article driven by the simulated controller.
pub trait Specimen {
    /// `(num_ctrl, num_daq)` the specimen expects, if fixed.
    fn shape(&self) -> Option<(usize, usize)> {
        None
    }

    /// Measured response for the commanded ctrl signals.
    fn respond(&mut self, ctrl: &[f64], daq: &mut [f64]) -> TransportResult<()>;

    /// Called when the host commits a converged step.
    fn commit(&mut self) {}
}

/// `daq = G * ctrl + d0`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSpecimen {
    gain: DMatrix<f64>,
    bias: DVector<f64>,
}

impl LinearSpecimen {
    /// # Errors
    ///
    /// Returns error if `bias` does not have one entry per gain row.
    pub fn new(gain: DMatrix<f64>, bias: DVector<f64>) -> TransportResult<Self> {
        if bias.len() != gain.nrows() {
            return Err(TransportError::LengthMismatch {
                what: "specimen bias",
                expected: gain.nrows(),
                got: bias.len(),
            });
        }
        Ok(Self { gain, bias })
    }

    /// Gain matrix from row-major values, zero bias.
    pub fn from_rows(num_daq: usize, num_ctrl: usize, rows: &[f64]) -> TransportResult<Self> {
        if rows.len() != num_daq * num_ctrl {
            return Err(TransportError::LengthMismatch {
                what: "specimen gain",
                expected: num_daq * num_ctrl,
                got: rows.len(),
            });
        }
        Self::new(
            DMatrix::from_row_slice(num_daq, num_ctrl, rows),
            DVector::zeros(num_daq),
        )
    }

    /// Independent springs: `daq[i] = k[i] * ctrl[i]`.
    pub fn springs(stiffness: &[f64]) -> Self {
        let n = stiffness.len();
        Self {
            gain: DMatrix::from_diagonal(&DVector::from_column_slice(stiffness)),
            bias: DVector::zeros(n),
        }
    }

    pub fn with_bias(mut self, bias: &[f64]) -> TransportResult<Self> {
        if bias.len() != self.gain.nrows() {
            return Err(TransportError::LengthMismatch {
                what: "specimen bias",
                expected: self.gain.nrows(),
                got: bias.len(),
            });
        }
        self.bias = DVector::from_column_slice(bias);
        Ok(self)
    }

    pub fn gain(&self) -> &DMatrix<f64> {
        &self.gain
    }
}

impl Specimen for LinearSpecimen {
    fn shape(&self) -> Option<(usize, usize)> {
        Some((self.gain.ncols(), self.gain.nrows()))
    }

    fn respond(&mut self, ctrl: &[f64], daq: &mut [f64]) -> TransportResult<()> {
        let x = DVector::from_column_slice(ctrl);
        let y = &self.gain * x + &self.bias;
        daq.copy_from_slice(y.as_slice());
        Ok(())
    }
}

/// Flag and call counters of a simulated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimCounters {
    pub flag_writes: usize,
    pub flag_reads: usize,
    pub vector_writes: usize,
    pub vector_reads: usize,
    pub commits: usize,
}

#[derive(Debug)]
pub struct SimulatedController<S: Specimen> {
    specimen: S,
    mode: HandshakeMode,
    ack_delay: usize,
    connected: bool,
    configured: bool,
    ctrl: Vec<f64>,
    daq: Vec<f64>,
    new_target: i32,
    switch_ack: i32,
    at_target: i32,
    pending: usize,
    counters: SimCounters,
}

impl<S: Specimen> SimulatedController<S> {
    /// Flag-mode controller that acknowledges on the first poll.
    pub fn new(specimen: S) -> Self {
        Self {
            specimen,
            mode: HandshakeMode::Flags,
            ack_delay: 0,
            connected: false,
            configured: false,
            ctrl: Vec::new(),
            daq: Vec::new(),
            new_target: 0,
            switch_ack: 0,
            at_target: 0,
            pending: 0,
            counters: SimCounters::default(),
        }
    }

    pub fn with_mode(mut self, mode: HandshakeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of unanswered polls before each flag change is acknowledged.
    pub fn with_ack_delay(mut self, polls: usize) -> Self {
        self.ack_delay = polls;
        self
    }

    pub fn specimen(&self) -> &S {
        &self.specimen
    }

    pub fn ctrl(&self) -> &[f64] {
        &self.ctrl
    }

    pub fn daq(&self) -> &[f64] {
        &self.daq
    }

    pub fn counters(&self) -> SimCounters {
        self.counters
    }

    fn ensure_ready(&self) -> TransportResult<()> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if !self.configured {
            return Err(TransportError::NotConfigured);
        }
        Ok(())
    }

    fn move_to_target(&mut self) -> TransportResult<()> {
        self.specimen.respond(&self.ctrl, &mut self.daq)?;
        self.at_target = 1;
        Ok(())
    }
}

impl<S: Specimen> Transport for SimulatedController<S> {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn mode(&self) -> HandshakeMode {
        self.mode
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> TransportResult<()> {
        if !self.connected {
            self.connected = true;
            info!(mode = ?self.mode, ack_delay = self.ack_delay, "simulated controller online");
        }
        Ok(())
    }

    fn configure(&mut self, sizes: &TransportSizes) -> TransportResult<()> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some((num_ctrl, num_daq)) = self.specimen.shape() {
            if num_ctrl != sizes.num_ctrl_signals || num_daq != sizes.num_daq_signals {
                return Err(TransportError::Config {
                    what: format!(
                        "specimen takes {num_ctrl} ctrl and gives {num_daq} daq signals, \
                         adapter has {} and {}",
                        sizes.num_ctrl_signals, sizes.num_daq_signals
                    ),
                });
            }
        }
        self.ctrl = vec![0.0; sizes.num_ctrl_signals];
        self.daq = vec![0.0; sizes.num_daq_signals];
        self.configured = true;
        // initial state is a valid measurement of the unloaded specimen
        self.move_to_target()?;
        debug!(daq = ?self.daq, "simulated controller at rest");
        Ok(())
    }

    fn write_vector(&mut self, values: &[f64]) -> TransportResult<()> {
        self.ensure_ready()?;
        if values.len() != self.ctrl.len() {
            return Err(TransportError::LengthMismatch {
                what: "ctrl signals",
                expected: self.ctrl.len(),
                got: values.len(),
            });
        }
        self.counters.vector_writes += 1;
        self.ctrl.copy_from_slice(values);
        if self.mode == HandshakeMode::RoundTrip {
            self.move_to_target()?;
        }
        Ok(())
    }

    fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()> {
        self.ensure_ready()?;
        if out.len() != self.daq.len() {
            return Err(TransportError::LengthMismatch {
                what: "daq signals",
                expected: self.daq.len(),
                got: out.len(),
            });
        }
        self.counters.vector_reads += 1;
        out.copy_from_slice(&self.daq);
        Ok(())
    }

    fn write_flag(&mut self, flag: Flag, value: i32) -> TransportResult<()> {
        self.ensure_ready()?;
        if flag != Flag::NewTarget {
            return Err(TransportError::InvalidArg {
                what: "only the new target flag is written by the host",
            });
        }
        self.counters.flag_writes += 1;
        self.new_target = value;
        self.pending = self.ack_delay;
        if value == 1 {
            self.at_target = 0;
        }
        Ok(())
    }

    fn read_flag(&mut self, flag: Flag) -> TransportResult<i32> {
        self.ensure_ready()?;
        self.counters.flag_reads += 1;
        let value = match flag {
            Flag::NewTarget => self.new_target,
            Flag::AtTarget => self.at_target,
            Flag::SwitchAck => {
                if self.pending > 0 {
                    self.pending -= 1;
                } else if self.switch_ack != self.new_target {
                    self.switch_ack = self.new_target;
                    if self.new_target == 1 {
                        self.move_to_target()?;
                    }
                }
                self.switch_ack
            }
        };
        Ok(value)
    }

    fn commit(&mut self) -> TransportResult<()> {
        self.ensure_ready()?;
        self.specimen.commit();
        self.counters.commits += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        if self.connected {
            self.new_target = -1;
            self.connected = false;
            info!("simulated controller offline");
        }
        Ok(())
    }
}
