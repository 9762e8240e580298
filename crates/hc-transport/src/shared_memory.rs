//! Shared-memory record transport (ring-network reflective memory).
//!
//! The host and the controller exchange one fixed-layout record in a
//! shared region:
//!
//! ```text
//! base + 0   i32  new_target
//! base + 4   i32  switch_ack
//! base + 8   i32  at_target
//! base + 12  f32  ctrl[num_ctrl]
//! ...        f32  daq[num_daq]
//! ```
//!
//! All accesses are bounds checked against the region length and encoded
//! little-endian.

use tracing::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::transport::{Flag, HandshakeMode, Transport, TransportSizes};

const FLAG_BYTES: usize = 4;
const VALUE_BYTES: usize = 4;
const NUM_FLAGS: usize = 3;

/// Byte-addressable memory shared with a controller.
pub trait MemoryRegion {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> TransportResult<()>;

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> TransportResult<()>;
}

fn check_bounds(offset: usize, len: usize, size: usize) -> TransportResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(TransportError::OutOfBounds { offset, len, size }),
    }
}

/// Process-local region, used for testing and loopback setups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapRegion {
    bytes: Vec<u8>,
}

impl HeapRegion {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl MemoryRegion for HeapRegion {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> TransportResult<()> {
        check_bounds(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> TransportResult<()> {
        check_bounds(offset, bytes.len(), self.bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Region backed by a file both sides open, e.g. under `/dev/shm` or a
/// reflective-memory device node.
#[cfg(unix)]
#[derive(Debug)]
pub struct FileRegion {
    file: std::fs::File,
    size: usize,
}

#[cfg(unix)]
impl FileRegion {
    /// Open (creating if needed) `path` and make sure it spans `size` bytes.
    pub fn open(path: &std::path::Path, size: usize) -> TransportResult<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| TransportError::io("open region", e))?;
        let current = file
            .metadata()
            .map_err(|e| TransportError::io("open region", e))?
            .len();
        if current < size as u64 {
            file.set_len(size as u64)
                .map_err(|e| TransportError::io("open region", e))?;
        }
        Ok(Self { file, size })
    }
}

#[cfg(unix)]
impl MemoryRegion for FileRegion {
    fn len(&self) -> usize {
        self.size
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> TransportResult<()> {
        use std::os::unix::fs::FileExt;
        check_bounds(offset, buf.len(), self.size)?;
        self.file
            .read_exact_at(buf, offset as u64)
            .map_err(|e| TransportError::io("read region", e))
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> TransportResult<()> {
        use std::os::unix::fs::FileExt;
        check_bounds(offset, bytes.len(), self.size)?;
        self.file
            .write_all_at(bytes, offset as u64)
            .map_err(|e| TransportError::io("write region", e))
    }
}

/// Field offsets of the exchanged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub base: usize,
    pub num_ctrl: usize,
    pub num_daq: usize,
}

impl RecordLayout {
    pub fn new(base: usize, num_ctrl: usize, num_daq: usize) -> Self {
        Self {
            base,
            num_ctrl,
            num_daq,
        }
    }

    pub fn flag_offset(&self, flag: Flag) -> usize {
        let slot = match flag {
            Flag::NewTarget => 0,
            Flag::SwitchAck => 1,
            Flag::AtTarget => 2,
        };
        self.base + slot * FLAG_BYTES
    }

    pub fn ctrl_offset(&self) -> usize {
        self.base + NUM_FLAGS * FLAG_BYTES
    }

    pub fn daq_offset(&self) -> usize {
        self.ctrl_offset() + self.num_ctrl * VALUE_BYTES
    }

    /// One past the last byte of the record.
    pub fn end(&self) -> usize {
        self.daq_offset() + self.num_daq * VALUE_BYTES
    }
}

fn encode_f32(values: &[f64]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|&v| (v as f32).to_le_bytes())
        .collect()
}

fn decode_f32(bytes: &[u8], out: &mut [f64]) {
    for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(VALUE_BYTES)) {
        let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
        *dst = f64::from(f32::from_le_bytes(raw));
    }
}

#[derive(Debug)]
pub struct SharedMemoryTransport<R: MemoryRegion> {
    region: R,
    base: usize,
    layout: Option<RecordLayout>,
    connected: bool,
}

impl<R: MemoryRegion> SharedMemoryTransport<R> {
    /// Record starts `base` bytes into `region`.
    pub fn new(region: R, base: usize) -> Self {
        Self {
            region,
            base,
            layout: None,
            connected: false,
        }
    }

    pub fn layout(&self) -> Option<&RecordLayout> {
        self.layout.as_ref()
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut R {
        &mut self.region
    }

    fn ready_layout(&self) -> TransportResult<RecordLayout> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.layout.ok_or(TransportError::NotConfigured)
    }

    fn write_i32(&mut self, offset: usize, value: i32) -> TransportResult<()> {
        self.region.write_bytes(offset, &value.to_le_bytes())
    }

    fn read_i32(&self, offset: usize) -> TransportResult<i32> {
        let mut buf = [0u8; FLAG_BYTES];
        self.region.read_bytes(offset, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }
}

impl<R: MemoryRegion> Transport for SharedMemoryTransport<R> {
    fn name(&self) -> &'static str {
        "shared-memory"
    }

    fn mode(&self) -> HandshakeMode {
        HandshakeMode::Flags
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> TransportResult<()> {
        if self.connected {
            return Ok(());
        }
        if self.base >= self.region.len() {
            return Err(TransportError::Config {
                what: format!(
                    "record base offset {} outside region of {} bytes",
                    self.base,
                    self.region.len()
                ),
            });
        }
        self.connected = true;
        info!(base = self.base, size = self.region.len(), "shared memory region attached");
        Ok(())
    }

    fn configure(&mut self, sizes: &TransportSizes) -> TransportResult<()> {
        let layout = RecordLayout::new(self.base, sizes.num_ctrl_signals, sizes.num_daq_signals);
        if layout.end() > self.region.len() {
            return Err(TransportError::Config {
                what: format!(
                    "record needs {} bytes but region has {}",
                    layout.end(),
                    self.region.len()
                ),
            });
        }
        debug!(
            ctrl_offset = layout.ctrl_offset(),
            daq_offset = layout.daq_offset(),
            end = layout.end(),
            "shared memory record laid out"
        );
        self.layout = Some(layout);
        Ok(())
    }

    fn write_vector(&mut self, values: &[f64]) -> TransportResult<()> {
        let layout = self.ready_layout()?;
        if values.len() != layout.num_ctrl {
            return Err(TransportError::LengthMismatch {
                what: "ctrl signals",
                expected: layout.num_ctrl,
                got: values.len(),
            });
        }
        self.region
            .write_bytes(layout.ctrl_offset(), &encode_f32(values))
    }

    fn read_vector(&mut self, out: &mut [f64]) -> TransportResult<()> {
        let layout = self.ready_layout()?;
        if out.len() != layout.num_daq {
            return Err(TransportError::LengthMismatch {
                what: "daq signals",
                expected: layout.num_daq,
                got: out.len(),
            });
        }
        let mut bytes = vec![0u8; layout.num_daq * VALUE_BYTES];
        self.region.read_bytes(layout.daq_offset(), &mut bytes)?;
        decode_f32(&bytes, out);
        Ok(())
    }

    fn write_flag(&mut self, flag: Flag, value: i32) -> TransportResult<()> {
        let layout = self.ready_layout()?;
        self.write_i32(layout.flag_offset(flag), value)
    }

    fn read_flag(&mut self, flag: Flag) -> TransportResult<i32> {
        let layout = self.ready_layout()?;
        self.read_i32(layout.flag_offset(flag))
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        if !self.connected {
            return Ok(());
        }
        if let Some(layout) = self.layout {
            // -1 stops the controller's predictor-corrector
            self.write_i32(layout.flag_offset(Flag::NewTarget), -1)?;
        }
        self.connected = false;
        info!("shared memory region released");
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn record_blocks_are_contiguous(base in 0_usize..4096, num_ctrl in 0_usize..64, num_daq in 0_usize..64) {
            let layout = RecordLayout::new(base, num_ctrl, num_daq);
            prop_assert_eq!(layout.flag_offset(Flag::NewTarget), base);
            prop_assert!(layout.flag_offset(Flag::SwitchAck) < layout.flag_offset(Flag::AtTarget));
            prop_assert_eq!(layout.ctrl_offset(), layout.flag_offset(Flag::AtTarget) + 4);
            prop_assert_eq!(layout.end(), base + 12 + 4 * (num_ctrl + num_daq));
        }
    }
}
