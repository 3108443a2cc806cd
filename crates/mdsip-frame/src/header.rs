//! The fixed 48-byte message header.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Wire size of [`MsgHdr`].
pub const HEADER_SIZE: usize = 48;

/// Maximum number of array dimensions a header can carry.
pub const MAX_DIMS: usize = 8;

/// Client type for little-endian IEEE hosts.
pub const IEEE_CLIENT: i8 = 2;

/// Flag bit in `client_type` marking a zlib-compressed body.
pub const COMPRESSED: i8 = 0x20;

/// The header that precedes every message body.
///
/// All fields are little-endian. `msglen` counts the header itself plus
/// the body. For array payloads `dims` holds the shape in wire order,
/// which is the reverse of the logical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHdr {
    pub msglen: i32,
    pub status: i32,
    pub length: i16,
    pub nargs: u8,
    pub descriptor_idx: u8,
    pub message_id: u8,
    pub dtype: u8,
    pub client_type: i8,
    pub ndims: u8,
    pub dims: [i32; MAX_DIMS],
}

impl Default for MsgHdr {
    fn default() -> Self {
        Self {
            msglen: HEADER_SIZE as i32,
            status: 0,
            length: 0,
            nargs: 0,
            descriptor_idx: 0,
            message_id: 0,
            dtype: 0,
            client_type: IEEE_CLIENT,
            ndims: 0,
            dims: [0; MAX_DIMS],
        }
    }
}

impl MsgHdr {
    /// Parse a header from exactly [`HEADER_SIZE`] bytes.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::Malformed("message header too short"));
        }

        let mut dims = [0i32; MAX_DIMS];
        for (i, raw) in buf[16..HEADER_SIZE].chunks_exact(4).enumerate() {
            dims[i] = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }

        Ok(Self {
            msglen: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            status: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            length: i16::from_le_bytes([buf[8], buf[9]]),
            nargs: buf[10],
            descriptor_idx: buf[11],
            message_id: buf[12],
            dtype: buf[13],
            client_type: buf[14] as i8,
            ndims: buf[15],
            dims,
        })
    }

    pub fn put(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_i32_le(self.msglen);
        dst.put_i32_le(self.status);
        dst.put_i16_le(self.length);
        dst.put_u8(self.nargs);
        dst.put_u8(self.descriptor_idx);
        dst.put_u8(self.message_id);
        dst.put_u8(self.dtype);
        dst.put_i8(self.client_type);
        dst.put_u8(self.ndims);
        for dim in self.dims {
            dst.put_i32_le(dim);
        }
    }

    /// True when the body carries a zlib stream.
    pub fn is_compressed(&self) -> bool {
        self.client_type & COMPRESSED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wire_size() {
        let mut buf = BytesMut::new();
        MsgHdr::default().put(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);
    }

    #[test]
    fn header_roundtrip() {
        let hdr = MsgHdr {
            msglen: 60,
            status: 1,
            length: 4,
            nargs: 3,
            descriptor_idx: 1,
            message_id: 9,
            dtype: 8,
            client_type: IEEE_CLIENT | COMPRESSED,
            ndims: 2,
            dims: [3, 2, 0, 0, 0, 0, 0, 0],
        };
        let mut buf = BytesMut::new();
        hdr.put(&mut buf);
        assert_eq!(MsgHdr::parse(&buf).unwrap(), hdr);
    }

    #[test]
    fn field_offsets_match_layout() {
        let hdr = MsgHdr {
            message_id: 7,
            dtype: 14,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        hdr.put(&mut buf);
        assert_eq!(buf[12], 7);
        assert_eq!(buf[13], 14);
        assert_eq!(buf[14] as i8, IEEE_CLIENT);
    }
}
