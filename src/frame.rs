//! Ranging frames
//!
//! Both frames are IEEE 802.15.4 data frames with PAN id compression and short
//! addresses, followed by a one byte function code. All multi-byte fields are
//! little-endian.
//!
//! ```text
//! Poll     (10 bytes): 41 88 | seq | pan(2) | dst(2) | src(2) | E0
//! Response (18 bytes): 41 88 | seq | pan(2) | src(2) | dst(2) | E1 | poll_rx(4) | resp_tx(4)
//! ```
//!
//! Received frames are validated with [`verify_masked`] against a template
//! built by the same encoder, so that fields which legitimately change between
//! exchanges (the sequence number, the embedded timestamps) are never compared.

use byte::{BytesExt, TryRead, LE};

#[cfg(feature = "defmt")]
use defmt::Format;

/// Length of a Poll frame, without FCS
pub const POLL_LEN: usize = 10;

/// Length of a Response frame, without FCS
pub const RESPONSE_LEN: usize = 18;

/// Frame control field: data frame, PAN id compression, short addresses
pub const FRAME_CONTROL: [u8; 2] = [0x41, 0x88];

/// Function code of a Poll frame
pub const FUNCTION_POLL: u8 = 0xE0;

/// Function code of a Response frame
pub const FUNCTION_RESPONSE: u8 = 0xE1;

/// Bytes of a Poll that a responder compares
///
/// The sequence number and the destination address are don't-care. The
/// destination is the responder's own address, which hardware frame filtering
/// has already checked by the time software sees the frame.
pub const POLL_MASK: [bool; POLL_LEN] = [
    true, true, // frame control
    false, // seq
    true, true, // pan
    false, false, // dst
    true, true, // src
    true, // function code
];

/// Like [`POLL_MASK`], but also accepting Polls from any source address
pub const POLL_MASK_ANY_SOURCE: [bool; POLL_LEN] = [
    true, true, // frame control
    false, // seq
    true, true, // pan
    false, false, // dst
    false, false, // src
    true, // function code
];

/// Bytes of a Response that an initiator compares
///
/// Everything up to and including the function code, except the sequence
/// number.
pub const RESPONSE_MASK: [bool; RESPONSE_LEN] = [
    true, true, // frame control
    false, // seq
    true, true, // pan
    true, true, // src
    true, true, // dst
    true, // function code
    false, false, false, false, // poll rx timestamp
    false, false, false, false, // response tx timestamp
];

const POLL_RX_TS_OFFSET: usize = 10;

/// Builds a Poll frame
pub fn encode_poll(pan_id: u16, src_addr: u16, dst_addr: u16, seq: u8) -> [u8; POLL_LEN] {
    let [pan_lo, pan_hi] = pan_id.to_le_bytes();
    let [dst_lo, dst_hi] = dst_addr.to_le_bytes();
    let [src_lo, src_hi] = src_addr.to_le_bytes();

    [
        FRAME_CONTROL[0],
        FRAME_CONTROL[1],
        seq,
        pan_lo,
        pan_hi,
        dst_lo,
        dst_hi,
        src_lo,
        src_hi,
        FUNCTION_POLL,
    ]
}

/// Builds a Response frame
///
/// Only the low 32 bits of the two timestamps are transmitted.
pub fn encode_response(
    pan_id: u16,
    src_addr: u16,
    dst_addr: u16,
    poll_rx_ts: u64,
    resp_tx_ts: u64,
    seq: u8,
) -> [u8; RESPONSE_LEN] {
    let mut frame = [0; RESPONSE_LEN];

    frame[..2].copy_from_slice(&FRAME_CONTROL);
    frame[2] = seq;
    frame[3..5].copy_from_slice(&pan_id.to_le_bytes());
    frame[5..7].copy_from_slice(&src_addr.to_le_bytes());
    frame[7..9].copy_from_slice(&dst_addr.to_le_bytes());
    frame[9] = FUNCTION_RESPONSE;
    frame[10..14].copy_from_slice(&(poll_rx_ts as u32).to_le_bytes());
    frame[14..18].copy_from_slice(&(resp_tx_ts as u32).to_le_bytes());

    frame
}

/// Compares `received` with `expected` wherever `mask` is set
///
/// Frames of a different length than the template never match.
pub fn verify_masked(expected: &[u8], received: &[u8], mask: &[bool]) -> bool {
    if expected.len() != received.len() || mask.len() != expected.len() {
        return false;
    }

    expected
        .iter()
        .zip(received)
        .zip(mask)
        .all(|((expected, received), &checked)| !checked || expected == received)
}

/// A decoded Poll frame
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Poll {
    /// Sequence number
    pub seq: u8,
    /// PAN id
    pub pan_id: u16,
    /// Address of the responder being polled
    pub dst_addr: u16,
    /// Address of the initiator
    pub src_addr: u16,
}

impl<'a> TryRead<'a> for Poll {
    fn try_read(bytes: &'a [u8], _: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 2;

        let seq = bytes.read_with::<u8>(offset, LE)?;
        let pan_id = bytes.read_with::<u16>(offset, LE)?;
        let dst_addr = bytes.read_with::<u16>(offset, LE)?;
        let src_addr = bytes.read_with::<u16>(offset, LE)?;
        // function code
        *offset += 1;

        Ok((
            Poll {
                seq,
                pan_id,
                dst_addr,
                src_addr,
            },
            *offset,
        ))
    }
}

/// A decoded Response frame
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Response {
    /// Sequence number
    pub seq: u8,
    /// PAN id
    pub pan_id: u16,
    /// Address of the responder
    pub src_addr: u16,
    /// Address of the initiator
    pub dst_addr: u16,
    /// Low 32 bits of the responder's Poll RX timestamp
    pub poll_rx_ts: u32,
    /// Low 32 bits of the responder's Response TX timestamp
    pub resp_tx_ts: u32,
}

impl<'a> TryRead<'a> for Response {
    fn try_read(bytes: &'a [u8], _: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 2;

        let seq = bytes.read_with::<u8>(offset, LE)?;
        let pan_id = bytes.read_with::<u16>(offset, LE)?;
        let src_addr = bytes.read_with::<u16>(offset, LE)?;
        let dst_addr = bytes.read_with::<u16>(offset, LE)?;

        *offset = POLL_RX_TS_OFFSET;
        let poll_rx_ts = bytes.read_with::<u32>(offset, LE)?;
        let resp_tx_ts = bytes.read_with::<u32>(offset, LE)?;

        Ok((
            Response {
                seq,
                pan_id,
                src_addr,
                dst_addr,
                poll_rx_ts,
                resp_tx_ts,
            },
            *offset,
        ))
    }
}
