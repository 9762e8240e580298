//! Controller transports and the control/acquire handshake.
//!
//! A [`Transport`] moves ctrl and daq arrays plus synchronization flags
//! between the host and one remote controller. The [`HandshakeProtocol`]
//! drives any transport through the same control and acquire cycles,
//! choosing flag polling or a blocking round trip from the transport's
//! [`HandshakeMode`]. Every wait is bounded by [`PollOptions`] and can be
//! interrupted through a [`CancelToken`].
//!
//! Transports:
//! - [`SharedMemoryTransport`]: fixed record in a shared region (flag mode)
//! - [`MessageTransport`]: fixed-size frames over a byte stream (round trip)
//! - [`SimulatedController`]: in-process controller driving a [`Specimen`]

pub mod error;
pub mod handshake;
pub mod message;
pub mod poll;
pub mod shared_memory;
pub mod sim;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use handshake::{HandshakeProtocol, HandshakeState, HandshakeStats};
pub use message::{DEFAULT_DATA_SIZE, MessageTransport, Opcode};
pub use poll::{CancelToken, PollOptions, poll_until};
#[cfg(unix)]
pub use shared_memory::FileRegion;
pub use shared_memory::{HeapRegion, MemoryRegion, RecordLayout, SharedMemoryTransport};
pub use sim::{LinearSpecimen, SimCounters, SimulatedController, Specimen};
pub use transport::{Flag, HandshakeMode, Transport, TransportSizes};
