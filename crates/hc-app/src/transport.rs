//! One concrete transport type covering every kind a project can select.

use std::net::TcpStream;

#[cfg(unix)]
use hc_transport::{FileRegion, SharedMemoryTransport};
use hc_transport::{
    Flag, HandshakeMode, LinearSpecimen, MessageTransport, SimulatedController, Transport,
    TransportResult, TransportSizes,
};

#[derive(Debug)]
pub enum AnyTransport {
    Simulated(SimulatedController<LinearSpecimen>),
    Message(MessageTransport<TcpStream>),
    #[cfg(unix)]
    SharedMemory(SharedMemoryTransport<FileRegion>),
}

macro_rules! each {
    ($self:expr, $t:ident => $body:expr) => {
        match $self {
            AnyTransport::Simulated($t) => $body,
            AnyTransport::Message($t) => $body,
            #[cfg(unix)]
            AnyTransport::SharedMemory($t) => $body,
        }
    };
}

impl AnyTransport {
    pub fn as_simulated(&self) -> Option<&SimulatedController<LinearSpecimen>> {
        match self {
            AnyTransport::Simulated(sim) => Some(sim),
            _ => None,
        }
    }
}

impl Transport for AnyTransport {
    fn name(&self) -> &'static str {
        each!(self, t => t.name())
    }

    fn mode(&self) -> HandshakeMode {
        each!(self, t => t.mode())
    }

    fn is_connected(&self) -> bool {
        each!(self, t => t.is_connected())
    }

    fn connect(&mut self) -> TransportResult<()> {
        each!(self, t => t.connect())
    }

    fn configure(&mut self, sizes: &TransportSizes) -> TransportResult<()> {
        each!(self, t => t.configure(sizes))
    }

    fn write_vector(&mut self, values: &[f64]) -> TransportResult<()> {
        each!(self, t => t.write_vector(values))
    }

    fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()> {
        each!(self, t => t.read_vector(out))
    }

    fn write_flag(&mut self, flag: Flag, value: i32) -> TransportResult<()> {
        each!(self, t => t.write_flag(flag, value))
    }

    fn read_flag(&mut self, flag: Flag) -> TransportResult<i32> {
        each!(self, t => t.read_flag(flag))
    }

    fn commit(&mut self) -> TransportResult<()> {
        each!(self, t => t.commit())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        each!(self, t => t.disconnect())
    }
}
