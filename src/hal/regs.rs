// Author: Lukas Bower
// Purpose: Describe the PIO register windows and control bits per core revision.

//! Bit-exact PIO register layout.
//!
//! Offsets are relative to a queue's register window. Cores older than
//! revision 8 expose 16-bit control and data registers with two byte-lane
//! enables; revision 8 and newer widen both to 32 bits with four lanes.
//! Revision 11 moved the queue windows to a new base table.

use bitflags::bitflags;

use crate::transfer::TransferWidth;

/// Queue window bases on cores older than revision 11.
const PIO_BASES: [u16; 8] = [0x300, 0x310, 0x320, 0x330, 0x340, 0x350, 0x360, 0x370];
/// Queue window bases on revision 11 and newer.
const PIO11_BASES: [u16; 6] = [0x200, 0x240, 0x280, 0x2c0, 0x300, 0x340];

/// TX control register (both widths).
pub const TXCTL: u16 = 0x00;
/// TX data register, 16-bit cores.
pub const TXDATA_16: u16 = 0x02;
/// TX queue buffer size register, 16-bit cores only.
pub const TXQBUFSIZE: u16 = 0x04;
/// TX data register, 32-bit cores.
pub const TXDATA_32: u16 = 0x04;
/// RX control register (both widths).
pub const RXCTL: u16 = 0x00;
/// RX data register, 16-bit cores.
pub const RXDATA_16: u16 = 0x02;
/// RX data register, 32-bit cores.
pub const RXDATA_32: u16 = 0x04;

bitflags! {
    /// TX control register on 16-bit cores.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxCtl16: u16 {
        const FREADY = 0x0001;
        const WRITELO = 0x0002;
        const WRITEHI = 0x0004;
        const EOF = 0x0010;
        const FLUSHREQ = 0x0020;
        const FLUSHPEND = 0x0040;
        const SUSPREQ = 0x0080;
        const QSUSP = 0x0100;
        const COMMCNT = 0xfc00;
    }
}

bitflags! {
    /// TX control register on 32-bit cores.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxCtl32: u32 {
        const LANE_0_7 = 0x0000_0001;
        const LANE_8_15 = 0x0000_0002;
        const LANE_16_23 = 0x0000_0004;
        const LANE_24_31 = 0x0000_0008;
        const EOF = 0x0000_0010;
        const FREADY = 0x0000_0080;
        const SUSPREQ = 0x0000_0100;
        const QSUSP = 0x0000_0200;
        const FLUSHREQ = 0x0000_0400;
        const FLUSHPEND = 0x0000_0800;
    }
}

bitflags! {
    /// RX control register; the same two bits on both widths.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxCtl: u32 {
        const FRAMERDY = 0x0001;
        const DATARDY = 0x0002;
    }
}

/// Core revision of the wireless MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CoreRevision(u8);

impl CoreRevision {
    /// Wrap a raw revision number.
    #[must_use]
    pub const fn new(revision: u8) -> Self {
        Self(revision)
    }

    /// Raw revision number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Register access width used for bulk transfers.
    #[must_use]
    pub const fn transfer_width(self) -> TransferWidth {
        if self.0 >= 8 {
            TransferWidth::Four
        } else {
            TransferWidth::Two
        }
    }

    /// Whether the TX buffer size must come from configuration instead of `TXQBUFSIZE`.
    #[must_use]
    pub const fn has_fixed_buffer_size(self) -> bool {
        self.0 >= 8
    }

    /// Base of the register window pair for `index`.
    #[must_use]
    pub fn queue_base(self, index: usize) -> Option<u16> {
        if self.0 >= 11 {
            PIO11_BASES.get(index).copied()
        } else {
            PIO_BASES.get(index).copied()
        }
    }

    /// TX register window for queue `index`.
    #[must_use]
    pub fn tx_window(self, index: usize) -> Option<u16> {
        let offset = if self.0 >= 11 { 0x18 } else { 0 };
        self.queue_base(index).map(|base| base + offset)
    }

    /// RX register window for queue `index`.
    #[must_use]
    pub fn rx_window(self, index: usize) -> Option<u16> {
        let offset = if self.0 >= 11 { 0x38 } else { 8 };
        self.queue_base(index).map(|base| base + offset)
    }
}

/// TX register layout for one transfer width, with control bits widened to `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxLayout {
    /// Access width.
    pub width: TransferWidth,
    /// Data register offset within the window.
    pub data: u16,
    /// Frame-ready bit.
    pub fready: u32,
    /// End-of-frame bit.
    pub eof: u32,
    /// Suspend-request bit.
    pub suspend: u32,
    lanes: [u32; 4],
}

impl TxLayout {
    /// Layout for the given access width.
    #[must_use]
    pub const fn for_width(width: TransferWidth) -> Self {
        match width {
            TransferWidth::Two => Self {
                width,
                data: TXDATA_16,
                fready: TxCtl16::FREADY.bits() as u32,
                eof: TxCtl16::EOF.bits() as u32,
                suspend: TxCtl16::SUSPREQ.bits() as u32,
                lanes: [
                    TxCtl16::WRITELO.bits() as u32,
                    TxCtl16::WRITEHI.bits() as u32,
                    0,
                    0,
                ],
            },
            TransferWidth::Four => Self {
                width,
                data: TXDATA_32,
                fready: TxCtl32::FREADY.bits(),
                eof: TxCtl32::EOF.bits(),
                suspend: TxCtl32::SUSPREQ.bits(),
                lanes: [
                    TxCtl32::LANE_0_7.bits(),
                    TxCtl32::LANE_8_15.bits(),
                    TxCtl32::LANE_16_23.bits(),
                    TxCtl32::LANE_24_31.bits(),
                ],
            },
        }
    }

    /// Lane-enable bits for a write carrying `bytes` valid low-order bytes.
    #[must_use]
    pub fn lane_mask(&self, bytes: usize) -> u32 {
        self.lanes
            .iter()
            .take(bytes.min(self.width.bytes()))
            .fold(0, |mask, lane| mask | lane)
    }

    /// Lane-enable bits for a full-width burst.
    #[must_use]
    pub fn all_lanes(&self) -> u32 {
        self.lane_mask(self.width.bytes())
    }

    /// Number of lanes enabled in `ctl`, i.e. valid bytes in the next data write.
    #[must_use]
    pub fn enabled_lanes(&self, ctl: u32) -> usize {
        self.lanes
            .iter()
            .take(self.width.bytes())
            .take_while(|lane| ctl & **lane != 0)
            .count()
    }
}

/// RX register layout for one transfer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxLayout {
    /// Access width.
    pub width: TransferWidth,
    /// Data register offset within the window.
    pub data: u16,
}

impl RxLayout {
    /// Layout for the given access width.
    #[must_use]
    pub const fn for_width(width: TransferWidth) -> Self {
        match width {
            TransferWidth::Two => Self {
                width,
                data: RXDATA_16,
            },
            TransferWidth::Four => Self {
                width,
                data: RXDATA_32,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_windows_follow_sixteen_byte_stride() {
        let rev = CoreRevision::new(5);
        assert_eq!(rev.tx_window(0), Some(0x300));
        assert_eq!(rev.tx_window(4), Some(0x340));
        assert_eq!(rev.rx_window(0), Some(0x308));
        assert_eq!(rev.tx_window(8), None);
        assert_eq!(rev.transfer_width(), TransferWidth::Two);
    }

    #[test]
    fn rev11_windows_use_new_base_table() {
        let rev = CoreRevision::new(11);
        assert_eq!(rev.tx_window(0), Some(0x218));
        assert_eq!(rev.tx_window(3), Some(0x2d8));
        assert_eq!(rev.rx_window(0), Some(0x238));
        assert_eq!(rev.queue_base(6), None);
        assert_eq!(rev.transfer_width(), TransferWidth::Four);
    }

    #[test]
    fn rev8_keeps_legacy_bases_with_wide_transfers() {
        let rev = CoreRevision::new(8);
        assert_eq!(rev.tx_window(1), Some(0x310));
        assert_eq!(rev.transfer_width(), TransferWidth::Four);
        assert!(rev.has_fixed_buffer_size());
    }

    #[test]
    fn tail_lane_masks_cover_low_bytes_only() {
        let narrow = TxLayout::for_width(TransferWidth::Two);
        assert_eq!(narrow.all_lanes(), 0x0006);
        assert_eq!(narrow.lane_mask(1), 0x0002);

        let wide = TxLayout::for_width(TransferWidth::Four);
        assert_eq!(wide.all_lanes(), 0x000f);
        assert_eq!(wide.lane_mask(3), 0x0007);
        assert_eq!(wide.enabled_lanes(0x0083), 2);
    }
}
