//! Fixed-frame message transport over a byte stream.
//!
//! Every message is `data_size` little-endian f64 values. Host frames carry
//! the opcode in element 0 and the payload after it; reply frames carry the
//! daq signals from element 0. Sizing is announced once with an i32 header
//! of `2 * 5 + 1` values: ctrl sizes, daq sizes, `data_size`.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use hc_core::ResponseType;
use tracing::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::transport::{Flag, HandshakeMode, Transport, TransportSizes};

pub const DEFAULT_DATA_SIZE: usize = 256;

const VALUE_BYTES: usize = 8;

/// Command tags placed in element 0 of host frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    Open = 1,
    Setup = 2,
    SetTrialResponse = 3,
    Execute = 4,
    CommitState = 5,
    GetDaqResponse = 6,
    GetDisp = 7,
    GetVel = 8,
    GetAccel = 9,
    GetForce = 10,
    GetTime = 11,
    Shutdown = 98,
    Die = 99,
}

impl Opcode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let op = match code {
            1 => Opcode::Open,
            2 => Opcode::Setup,
            3 => Opcode::SetTrialResponse,
            4 => Opcode::Execute,
            5 => Opcode::CommitState,
            6 => Opcode::GetDaqResponse,
            7 => Opcode::GetDisp,
            8 => Opcode::GetVel,
            9 => Opcode::GetAccel,
            10 => Opcode::GetForce,
            11 => Opcode::GetTime,
            98 => Opcode::Shutdown,
            99 => Opcode::Die,
            _ => return None,
        };
        Some(op)
    }
}

/// Size header sent by [`Transport::configure`].
pub fn encode_size_header(sizes: &TransportSizes, data_size: usize) -> TransportResult<Vec<u8>> {
    let mut header = Vec::with_capacity((2 * ResponseType::COUNT + 1) * 4);
    let fields = sizes
        .ctrl
        .as_array()
        .into_iter()
        .chain(sizes.daq.as_array())
        .chain(std::iter::once(data_size));
    for v in fields {
        let v = i32::try_from(v).map_err(|_| TransportError::InvalidArg {
            what: "size does not fit the i32 header",
        })?;
        header.extend_from_slice(&v.to_le_bytes());
    }
    Ok(header)
}

type Connector<S> = Box<dyn FnMut() -> io::Result<S>>;

pub struct MessageTransport<S: Read + Write> {
    stream: Option<S>,
    connector: Option<Connector<S>>,
    data_size: usize,
    sizes: Option<TransportSizes>,
    frame: Vec<u8>,
}

impl<S: Read + Write> std::fmt::Debug for MessageTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTransport")
            .field("connected", &self.stream.is_some())
            .field("data_size", &self.data_size)
            .field("sizes", &self.sizes)
            .finish()
    }
}

impl<S: Read + Write> MessageTransport<S> {
    /// Wrap an already open stream.
    pub fn from_stream(stream: S, data_size: usize) -> Self {
        Self {
            stream: Some(stream),
            connector: None,
            data_size,
            sizes: None,
            frame: Vec::new(),
        }
    }

    /// Open the stream lazily on [`Transport::connect`].
    pub fn with_connector<F>(connector: F, data_size: usize) -> Self
    where
        F: FnMut() -> io::Result<S> + 'static,
    {
        Self {
            stream: None,
            connector: Some(Box::new(connector)),
            data_size,
            sizes: None,
            frame: Vec::new(),
        }
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn stream(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    fn stream_mut(&mut self) -> TransportResult<&mut S> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Send one host frame: opcode, then `payload`, zero padded.
    pub fn send(&mut self, op: Opcode, payload: &[f64]) -> TransportResult<()> {
        if payload.len() + 1 > self.data_size {
            return Err(TransportError::Config {
                what: format!(
                    "{} payload values do not fit a frame of {} values",
                    payload.len(),
                    self.data_size
                ),
            });
        }
        let mut frame = std::mem::take(&mut self.frame);
        frame.clear();
        frame.extend_from_slice(&f64::from(op.code()).to_le_bytes());
        for v in payload {
            frame.extend_from_slice(&v.to_le_bytes());
        }
        frame.resize(self.data_size * VALUE_BYTES, 0);

        let result = self
            .stream_mut()
            .and_then(|s| {
                s.write_all(&frame)
                    .and_then(|()| s.flush())
                    .map_err(|e| TransportError::io("send frame", e))
            });
        self.frame = frame;
        result
    }

    /// Receive one reply frame and decode its leading values into `out`.
    pub fn recv(&mut self, out: &mut [f64]) -> TransportResult<()> {
        if out.len() > self.data_size {
            return Err(TransportError::Config {
                what: format!(
                    "{} reply values do not fit a frame of {} values",
                    out.len(),
                    self.data_size
                ),
            });
        }
        let mut frame = std::mem::take(&mut self.frame);
        frame.clear();
        frame.resize(self.data_size * VALUE_BYTES, 0);

        let result = self.stream_mut().and_then(|s| {
            s.read_exact(&mut frame).map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => TransportError::Protocol {
                    op: "receive frame",
                    detail: "stream closed before a full frame arrived".to_string(),
                },
                _ => TransportError::io("receive frame", e),
            })
        });
        if result.is_ok() {
            for (dst, chunk) in out.iter_mut().zip(frame.chunks_exact(VALUE_BYTES)) {
                let mut raw = [0u8; VALUE_BYTES];
                raw.copy_from_slice(chunk);
                *dst = f64::from_le_bytes(raw);
            }
        }
        self.frame = frame;
        result
    }
}

impl MessageTransport<TcpStream> {
    /// TCP transport that connects to `addr` on [`Transport::connect`].
    pub fn tcp(addr: impl ToSocketAddrs + Clone + 'static, data_size: usize) -> Self {
        Self::with_connector(
            move || {
                let stream = TcpStream::connect(addr.clone())?;
                stream.set_nodelay(true)?;
                Ok(stream)
            },
            data_size,
        )
    }
}

impl<S: Read + Write> Transport for MessageTransport<S> {
    fn name(&self) -> &'static str {
        "message"
    }

    fn mode(&self) -> HandshakeMode {
        HandshakeMode::RoundTrip
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self) -> TransportResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let connector = self.connector.as_mut().ok_or(TransportError::NotConnected)?;
        let stream = connector().map_err(|e| TransportError::io("connect", e))?;
        self.stream = Some(stream);
        info!(data_size = self.data_size, "message transport connected");
        Ok(())
    }

    fn configure(&mut self, sizes: &TransportSizes) -> TransportResult<()> {
        if sizes.num_ctrl_signals + 1 > self.data_size || sizes.num_daq_signals > self.data_size {
            return Err(TransportError::Config {
                what: format!(
                    "data size {} too small for {} ctrl and {} daq signals",
                    self.data_size, sizes.num_ctrl_signals, sizes.num_daq_signals
                ),
            });
        }
        let header = encode_size_header(sizes, self.data_size)?;
        self.stream_mut()?
            .write_all(&header)
            .map_err(|e| TransportError::io("send size header", e))?;
        self.sizes = Some(*sizes);
        debug!(ctrl = %sizes.ctrl, daq = %sizes.daq, "size header sent");
        Ok(())
    }

    fn write_vector(&mut self, values: &[f64]) -> TransportResult<()> {
        self.send(Opcode::SetTrialResponse, values)
    }

    fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()> {
        self.send(Opcode::GetDaqResponse, &[])?;
        self.recv(out)
    }

    fn write_flag(&mut self, _flag: Flag, _value: i32) -> TransportResult<()> {
        Err(TransportError::Unsupported {
            op: "write flag",
            transport: "message",
        })
    }

    fn read_flag(&mut self, _flag: Flag) -> TransportResult<i32> {
        Err(TransportError::Unsupported {
            op: "read flag",
            transport: "message",
        })
    }

    fn commit(&mut self) -> TransportResult<()> {
        self.send(Opcode::CommitState, &[])
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        let sent = self.send(Opcode::Die, &[]);
        self.stream = None;
        info!("message transport disconnected");
        sent
    }
}
