//! The capability interface every controller transport implements.

use std::fmt;

use hc_core::ResponseSizes;

use crate::error::TransportResult;

/// How the control/acquire synchronization is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Separate flag cells polled by the host (shared memory, DSP boards).
    Flags,
    /// One blocking request/response per phase (sockets).
    RoundTrip,
}

/// Synchronization cells exchanged with a flag-mode controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Written by the host: 1 requests a new target, 0 clears it, -1 stops.
    NewTarget,
    /// Written by the controller: follows `NewTarget` once accepted.
    SwitchAck,
    /// Written by the controller: 1 once the commanded state is reached.
    AtTarget,
}

impl Flag {
    pub fn name(self) -> &'static str {
        match self {
            Flag::NewTarget => "new target",
            Flag::SwitchAck => "switch ack",
            Flag::AtTarget => "at target",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sizing handed to a transport once the adapter is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSizes {
    pub ctrl: ResponseSizes,
    pub daq: ResponseSizes,
    pub num_ctrl_signals: usize,
    pub num_daq_signals: usize,
}

/// Byte exchange with one remote controller.
///
/// All calls block. Implementations report failures as typed errors and
/// never retry on their own.
pub trait Transport {
    /// Short transport label used in logs and errors.
    fn name(&self) -> &'static str;

    fn mode(&self) -> HandshakeMode;

    fn is_connected(&self) -> bool;

    /// Open the connection or device handle. Idempotent.
    fn connect(&mut self) -> TransportResult<()>;

    /// Announce signal counts and per-type sizes to the controller.
    fn configure(&mut self, sizes: &TransportSizes) -> TransportResult<()>;

    /// Send the full ctrl signal array.
    fn write_vector(&mut self, values: &[f64]) -> TransportResult<()>;

    /// Receive the full daq signal array into `out`.
    fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()>;

    fn write_flag(&mut self, flag: Flag, value: i32) -> TransportResult<()>;

    fn read_flag(&mut self, flag: Flag) -> TransportResult<i32>;

    /// Persist the current state on the controller side. Most hardware
    /// controllers have no such notion.
    fn commit(&mut self) -> TransportResult<()> {
        Ok(())
    }

    /// Leave the device in a safe state and release the resource.
    fn disconnect(&mut self) -> TransportResult<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn mode(&self) -> HandshakeMode {
        (**self).mode()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn connect(&mut self) -> TransportResult<()> {
        (**self).connect()
    }

    fn configure(&mut self, sizes: &TransportSizes) -> TransportResult<()> {
        (**self).configure(sizes)
    }

    fn write_vector(&mut self, values: &[f64]) -> TransportResult<()> {
        (**self).write_vector(values)
    }

    fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()> {
        (**self).read_vector(out)
    }

    fn write_flag(&mut self, flag: Flag, value: i32) -> TransportResult<()> {
        (**self).write_flag(flag, value)
    }

    fn read_flag(&mut self, flag: Flag) -> TransportResult<i32> {
        (**self).read_flag(flag)
    }

    fn commit(&mut self) -> TransportResult<()> {
        (**self).commit()
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        (**self).disconnect()
    }
}
