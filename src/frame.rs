//! Wire frame layout and response decoding
//!
//! ```text
//! [0]      0xBB      start marker
//! [1]      kind      0x00 command, 0x01 notification, 0x02 tag data
//! [2]      opcode    0xFF in error responses
//! [3..4]   payload length, big-endian
//! [5..]    payload
//! [N-2]    checksum8 over [1..N-2)
//! [N-1]    0x7E      end marker
//! ```

use crate::buffer::ByteAccumulator;
use crate::checksum::checksum8;
use crate::types::{FrameError, ModuleStatus};

pub const HEADER: u8 = 0xBB;
pub const END: u8 = 0x7E;

pub const KIND_COMMAND: u8 = 0x00;
pub const KIND_NOTIFICATION: u8 = 0x01;
pub const KIND_TAG: u8 = 0x02;

/// Opcode of every error response; the payload holds one status byte.
pub const OPCODE_ERROR: u8 = 0xFF;

/// Start marker, kind, opcode and two length bytes.
pub const HEADER_LEN: usize = 5;

/// Header plus checksum and end marker, i.e. a frame with no payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 2;

/// A decoded frame with a verified checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub kind: u8,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn new(kind: u8, opcode: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            opcode,
            payload: payload.into(),
        }
    }

    /// Error response carrying a module status code.
    pub fn error(status: ModuleStatus) -> Self {
        Self::new(KIND_NOTIFICATION, OPCODE_ERROR, vec![status.into()])
    }

    pub fn is_error(&self) -> bool {
        self.opcode == OPCODE_ERROR
    }

    /// Status byte of an error response.
    pub fn status(&self) -> Option<ModuleStatus> {
        match (self.is_error(), self.payload.first()) {
            (true, Some(&code)) => Some(ModuleStatus::from(code)),
            _ => None,
        }
    }

    /// Serialize with length field and checksum filled in.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.payload.len() as u16;
        let mut frame = Vec::with_capacity(MIN_FRAME_LEN + self.payload.len());
        frame.extend_from_slice(&[HEADER, self.kind, self.opcode]);
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame.push(checksum8(&frame[1..]));
        frame.push(END);
        frame
    }
}

/// Decode the frame held by a closed accumulator.
pub fn decode(acc: &ByteAccumulator) -> Result<Response, FrameError> {
    if !acc.is_closed() {
        return Err(FrameError::Incomplete);
    }
    decode_bytes(acc.data())
}

/// Decode one complete frame, start marker through end marker.
pub fn decode_bytes(frame: &[u8]) -> Result<Response, FrameError> {
    if frame.last() != Some(&END) {
        return Err(FrameError::Incomplete);
    }
    if frame.len() < MIN_FRAME_LEN || frame[0] != HEADER {
        return Err(FrameError::TooShort(frame.len()));
    }

    let declared = declared_payload_len(frame).unwrap_or(0);
    let actual = frame.len() - MIN_FRAME_LEN;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let found = frame[frame.len() - 2];
    let computed = checksum8(&frame[1..frame.len() - 2]);
    if found != computed {
        return Err(FrameError::ChecksumMismatch { found, computed });
    }

    Ok(Response {
        kind: frame[1],
        opcode: frame[2],
        payload: frame[HEADER_LEN..frame.len() - 2].to_vec(),
    })
}

/// Payload length announced in the header, once the header is in.
pub fn declared_payload_len(frame: &[u8]) -> Option<usize> {
    if frame.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_be_bytes([frame[3], frame[4]]) as usize)
}

/// True when the header announces more bytes than have been received.
///
/// An end marker byte inside the payload closes the accumulator early;
/// this tells the receiver to keep reading.
pub(crate) fn expects_more(frame: &[u8]) -> bool {
    declared_payload_len(frame)
        .map(|declared| frame.len() < MIN_FRAME_LEN + declared)
        .unwrap_or(false)
}
