//! Frame layout
//!
//! ```text
//! +--------+--------+--------+------------------+
//! | marker | status | length | payload (length) |
//! +--------+--------+--------+------------------+
//! ```
//!
//! Requests carry status 0 and a payload made of the function id followed by
//! the packed arguments. There is no sequence number and no checksum.

use bincoms_core::{BincomsError, BincomsResult};
use bytes::{BufMut, BytesMut};

/// Marker byte of every frame
pub const MARKER: u8 = b'b';

/// Header length in bytes (marker, status, length)
pub const HEADER_LENGTH: usize = 3;

/// Largest payload the length byte can announce
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;

/// Frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub marker: u8,
    pub status: u8,
    pub length: u8,
}

impl FrameHeader {
    pub fn decode(bytes: [u8; HEADER_LENGTH]) -> Self {
        Self {
            marker: bytes[0],
            status: bytes[1],
            length: bytes[2],
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LENGTH] {
        [self.marker, self.status, self.length]
    }
}

/// A complete frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    status: u8,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a request frame for `function_id` with pre-packed arguments
    ///
    /// # Errors
    /// Returns `InvalidData` if the id byte plus arguments exceed 255 bytes
    pub fn request(function_id: u8, arguments: &[u8]) -> BincomsResult<Self> {
        let mut payload = Vec::with_capacity(1 + arguments.len());
        payload.push(function_id);
        payload.extend_from_slice(arguments);
        Self::new(0x00, payload)
    }

    /// Build a frame with an arbitrary status byte
    pub fn new(status: u8, payload: Vec<u8>) -> BincomsResult<Self> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(BincomsError::InvalidData(format!(
                "Frame payload too long: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_LENGTH
            )));
        }
        Ok(Self { status, payload })
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            marker: MARKER,
            status: self.status,
            length: self.payload.len() as u8,
        }
    }

    /// Function id of a request frame
    pub fn function_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Packed arguments of a request frame
    pub fn arguments(&self) -> &[u8] {
        self.payload.get(1..).unwrap_or(&[])
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH + self.payload.len());
        buf.put_slice(&self.header().encode());
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Decode one complete frame from a buffer
    ///
    /// The buffer must hold exactly one frame.
    pub fn decode(data: &[u8]) -> BincomsResult<Self> {
        if data.len() < HEADER_LENGTH {
            return Err(BincomsError::ProtocolFraming(format!(
                "Frame too short: expected at least {} bytes, got {}",
                HEADER_LENGTH,
                data.len()
            )));
        }
        let header = FrameHeader::decode([data[0], data[1], data[2]]);
        if header.marker != MARKER {
            return Err(BincomsError::ProtocolFraming(format!(
                "Unrecognized frame marker 0x{:02X}",
                header.marker
            )));
        }
        let payload = &data[HEADER_LENGTH..];
        if payload.len() != header.length as usize {
            return Err(BincomsError::ProtocolFraming(format!(
                "Frame length byte says {} but {} payload byte(s) present",
                header.length,
                payload.len()
            )));
        }
        Ok(Self {
            status: header.status,
            payload: payload.to_vec(),
        })
    }
}
