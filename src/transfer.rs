// Author: Lukas Bower
// Purpose: Move byte buffers through a PIO data register in 2- or 4-byte bursts.

//! Register transfer primitive.
//!
//! A buffer is split into full-width bursts followed by at most one ragged
//! tail. The device has no sub-width data access, so the tail is packed
//! little-endian into one final full-width register access. Callers that
//! must narrow a lane mask before the tail get a hook for it.

use crate::hal::Bus;

/// Data register access width, fixed per core revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferWidth {
    /// 16-bit registers (cores older than revision 8).
    Two,
    /// 32-bit registers (revision 8 and newer).
    Four,
}

impl TransferWidth {
    /// Burst size in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Split `len` into `(bulk, tail)` byte counts.
    #[must_use]
    pub const fn split(self, len: usize) -> (usize, usize) {
        let tail = len % self.bytes();
        (len - tail, tail)
    }

    /// Read a control register at this width.
    pub fn read_reg<B: Bus + ?Sized>(self, bus: &B, offset: u16) -> u32 {
        match self {
            Self::Two => u32::from(bus.read16(offset)),
            Self::Four => bus.read32(offset),
        }
    }

    /// Write a control register at this width. Upper bits are dropped on 16-bit cores.
    pub fn write_reg<B: Bus + ?Sized>(self, bus: &B, offset: u16, value: u32) {
        match self {
            Self::Two => bus.write16(offset, value as u16),
            Self::Four => bus.write32(offset, value),
        }
    }
}

trait Word: Copy {
    const BYTES: usize;

    fn pack(bytes: &[u8]) -> Self;
    fn unpack(self, out: &mut [u8]);
    fn write<B: Bus + ?Sized>(bus: &B, offset: u16, value: Self);
    fn read<B: Bus + ?Sized>(bus: &B, offset: u16) -> Self;
}

impl Word for u16 {
    const BYTES: usize = 2;

    fn pack(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 2];
        raw[..bytes.len()].copy_from_slice(bytes);
        u16::from_le_bytes(raw)
    }

    fn unpack(self, out: &mut [u8]) {
        let raw = self.to_le_bytes();
        let len = out.len();
        out.copy_from_slice(&raw[..len]);
    }

    fn write<B: Bus + ?Sized>(bus: &B, offset: u16, value: Self) {
        bus.write16(offset, value);
    }

    fn read<B: Bus + ?Sized>(bus: &B, offset: u16) -> Self {
        bus.read16(offset)
    }
}

impl Word for u32 {
    const BYTES: usize = 4;

    fn pack(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw[..bytes.len()].copy_from_slice(bytes);
        u32::from_le_bytes(raw)
    }

    fn unpack(self, out: &mut [u8]) {
        let raw = self.to_le_bytes();
        let len = out.len();
        out.copy_from_slice(&raw[..len]);
    }

    fn write<B: Bus + ?Sized>(bus: &B, offset: u16, value: Self) {
        bus.write32(offset, value);
    }

    fn read<B: Bus + ?Sized>(bus: &B, offset: u16) -> Self {
        bus.read32(offset)
    }
}

fn write_words<W, B, F>(bus: &B, offset: u16, data: &[u8], before_tail: F)
where
    W: Word,
    B: Bus + ?Sized,
    F: FnOnce(usize),
{
    let bulk = data.len() - data.len() % W::BYTES;
    for chunk in data[..bulk].chunks_exact(W::BYTES) {
        W::write(bus, offset, W::pack(chunk));
    }
    let tail = &data[bulk..];
    if !tail.is_empty() {
        before_tail(tail.len());
        W::write(bus, offset, W::pack(tail));
    }
}

fn read_words<W, B>(bus: &B, offset: u16, out: &mut [u8])
where
    W: Word,
    B: Bus + ?Sized,
{
    for chunk in out.chunks_mut(W::BYTES) {
        W::read(bus, offset).unpack(chunk);
    }
}

/// Write `data` to the data register at `offset`.
///
/// `before_tail` runs with the tail length just before the final partial
/// burst, and is not called when `data` is a whole number of bursts.
pub fn write_block<B, F>(bus: &B, width: TransferWidth, offset: u16, data: &[u8], before_tail: F)
where
    B: Bus + ?Sized,
    F: FnOnce(usize),
{
    match width {
        TransferWidth::Two => write_words::<u16, _, _>(bus, offset, data, before_tail),
        TransferWidth::Four => write_words::<u32, _, _>(bus, offset, data, before_tail),
    }
}

/// Fill `out` from the data register at `offset`; the tail takes the low bytes of the last read.
pub fn read_block<B: Bus + ?Sized>(bus: &B, width: TransferWidth, offset: u16, out: &mut [u8]) {
    match width {
        TransferWidth::Two => read_words::<u16, _>(bus, offset, out),
        TransferWidth::Four => read_words::<u32, _>(bus, offset, out),
    }
}
