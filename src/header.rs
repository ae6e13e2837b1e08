// Author: Lukas Bower
// Purpose: Build TX transport headers and parse the firmware RX header.

//! Device transport headers.
//!
//! The RX header is the 20-byte firmware layout that precedes every received
//! frame in the FIFO. TX header layouts are firmware specific, so the MAC
//! layer owns them; [`build_basic_tx_header`] is the fallback used when it
//! does not override [`crate::mac::MacLayer::build_tx_header`].

use bitflags::bitflags;
use heapless::Vec as HeaplessVec;

use crate::cookie::Cookie;
use crate::error::HeaderError;
use crate::frame::TxFrame;
use crate::types::TxFlags;

/// Size of the firmware RX header.
pub const RX_HEADER_LEN: usize = 20;
/// Capacity of a TX header buffer.
pub const MAX_TX_HEADER_LEN: usize = 128;
/// Length of the fallback TX header.
pub const BASIC_TX_HEADER_LEN: usize = 12;

/// Storage for one TX header.
pub type TxHeaderBuf = HeaplessVec<u8, MAX_TX_HEADER_LEN>;

bitflags! {
    /// MAC status word of the RX header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RxMacStatus: u32 {
        const FCSERR = 0x0000_0001;
        const RESP = 0x0000_0002;
        const PADDING = 0x0000_0004;
        const DEC = 0x0000_0008;
        const DECERR = 0x0000_0010;
        const KEYIDX = 0x0000_07e0;
        const BEACONSENT = 0x0000_8000;
        const AMSDU = 0x0001_0000;
        const RXST_VALID = 0x0100_0000;
        const _ = !0;
    }
}

bitflags! {
    /// MAC control word of the fallback TX header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxMacCtl: u32 {
        const ACK = 0x0000_0001;
        const AFTER_DTIM = 0x0000_0002;
    }
}

/// Firmware RX header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxHeader {
    /// Payload length in bytes.
    pub frame_len: u16,
    /// PHY RX status 0.
    pub phy_status0: u16,
    /// Received signal strength.
    pub rssi: u8,
    /// Signal quality.
    pub sig_qual: u8,
    /// PHY RX status 2.
    pub phy_status2: u16,
    /// PHY RX status 3.
    pub phy_status3: u16,
    /// MAC status word.
    pub mac_status: RxMacStatus,
    /// Low 16 bits of the MAC timestamp.
    pub mac_time: u16,
    /// Channel the frame arrived on.
    pub channel: u16,
}

fn le16(raw: &[u8; RX_HEADER_LEN], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

impl RxHeader {
    /// Header for a frame of `frame_len` bytes with the given status.
    #[must_use]
    pub fn new(frame_len: u16, mac_status: RxMacStatus) -> Self {
        Self {
            frame_len,
            mac_status,
            ..Self::default()
        }
    }

    /// Parse the little-endian wire layout.
    #[must_use]
    pub fn parse(raw: &[u8; RX_HEADER_LEN]) -> Self {
        Self {
            frame_len: le16(raw, 0),
            phy_status0: le16(raw, 4),
            rssi: raw[6],
            sig_qual: raw[7],
            phy_status2: le16(raw, 8),
            phy_status3: le16(raw, 10),
            mac_status: RxMacStatus::from_bits_retain(u32::from_le_bytes([
                raw[12], raw[13], raw[14], raw[15],
            ])),
            mac_time: le16(raw, 16),
            channel: le16(raw, 18),
        }
    }

    /// Serialise to the wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RX_HEADER_LEN] {
        let mut raw = [0u8; RX_HEADER_LEN];
        raw[0..2].copy_from_slice(&self.frame_len.to_le_bytes());
        raw[4..6].copy_from_slice(&self.phy_status0.to_le_bytes());
        raw[6] = self.rssi;
        raw[7] = self.sig_qual;
        raw[8..10].copy_from_slice(&self.phy_status2.to_le_bytes());
        raw[10..12].copy_from_slice(&self.phy_status3.to_le_bytes());
        raw[12..16].copy_from_slice(&self.mac_status.bits().to_le_bytes());
        raw[16..18].copy_from_slice(&self.mac_time.to_le_bytes());
        raw[18..20].copy_from_slice(&self.channel.to_le_bytes());
        raw
    }

    /// Alignment padding the device inserted ahead of the payload.
    #[must_use]
    pub fn padding(&self) -> usize {
        if self.mac_status.contains(RxMacStatus::PADDING) {
            2
        } else {
            0
        }
    }

    /// Key slot the frame was decrypted with.
    #[must_use]
    pub fn key_index(&self) -> u8 {
        ((self.mac_status.bits() & RxMacStatus::KEYIDX.bits()) >> 5) as u8
    }
}

/// Fallback TX header: frame length, cookie, MAC control word, priority class.
///
/// ```text
///  0..2   frame length (LE)
///  2..4   cookie (LE)
///  4..8   TxMacCtl (LE)
///  8      priority class
///  9..12  reserved
/// ```
pub fn build_basic_tx_header(
    frame: &TxFrame,
    cookie: Cookie,
    out: &mut TxHeaderBuf,
) -> Result<(), HeaderError> {
    let len = u16::try_from(frame.len()).map_err(|_| HeaderError::TooLong {
        len: frame.len(),
        max: usize::from(u16::MAX),
    })?;
    let mut ctl = TxMacCtl::empty();
    if !frame.flags().contains(TxFlags::NO_ACK) {
        ctl |= TxMacCtl::ACK;
    }
    if frame.flags().contains(TxFlags::SEND_AFTER_DTIM) {
        ctl |= TxMacCtl::AFTER_DTIM;
    }

    let mut raw = [0u8; BASIC_TX_HEADER_LEN];
    raw[0..2].copy_from_slice(&len.to_le_bytes());
    raw[2..4].copy_from_slice(&cookie.raw().to_le_bytes());
    raw[4..8].copy_from_slice(&ctl.bits().to_le_bytes());
    raw[8] = frame.class();

    out.clear();
    out.extend_from_slice(&raw).map_err(|_| HeaderError::TooLong {
        len: BASIC_TX_HEADER_LEN,
        max: MAX_TX_HEADER_LEN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueId;

    #[test]
    fn rx_header_parses_wire_layout() {
        let mut raw = [0u8; RX_HEADER_LEN];
        raw[0] = 0x34;
        raw[1] = 0x01;
        raw[6] = 0xc8;
        raw[12] = 0x05;
        raw[18] = 11;
        let header = RxHeader::parse(&raw);
        assert_eq!(header.frame_len, 0x134);
        assert_eq!(header.rssi, 0xc8);
        assert!(header.mac_status.contains(RxMacStatus::FCSERR));
        assert_eq!(header.padding(), 2);
        assert_eq!(header.channel, 11);
        assert_eq!(header.to_bytes(), raw);
    }

    #[test]
    fn rx_header_keeps_unknown_status_bits() {
        let mut header = RxHeader::new(64, RxMacStatus::empty());
        header.mac_status = RxMacStatus::from_bits_retain(0x8000_0040);
        assert_eq!(RxHeader::parse(&header.to_bytes()), header);
        assert_eq!(header.key_index(), 2);
    }

    #[test]
    fn basic_tx_header_embeds_cookie_and_length() {
        let frame = TxFrame::new(vec![0u8; 300], 1).with_flags(TxFlags::SEND_AFTER_DTIM);
        let cookie = Cookie::encode(QueueId::Multicast, 7).unwrap();
        let mut out = TxHeaderBuf::new();
        build_basic_tx_header(&frame, cookie, &mut out).unwrap();
        assert_eq!(out.len(), BASIC_TX_HEADER_LEN);
        assert_eq!(&out[0..2], &300u16.to_le_bytes());
        assert_eq!(&out[2..4], &0x5007u16.to_le_bytes());
        assert_eq!(out[4], 0x03);
        assert_eq!(out[8], 1);
    }

    #[test]
    fn basic_tx_header_rejects_oversized_frames() {
        let frame = TxFrame::new(vec![0u8; 70_000], 0);
        let cookie = Cookie::encode(QueueId::BestEffort, 0).unwrap();
        let mut out = TxHeaderBuf::new();
        assert!(matches!(
            build_basic_tx_header(&frame, cookie, &mut out),
            Err(HeaderError::TooLong { len: 70_000, .. })
        ));
    }
}
