//! A complete wire message: header plus data-only body.
//!
//! Only missing, scalar and array values have a data-only body form;
//! composite values travel as serialized descriptor buffers inside a
//! byte array. Bodies may be zlib-compressed, in which case the first
//! four body bytes hold the original message length.

use std::io::Read;

use bytes::{Buf, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use mdsip_codec::registry::dtype;
use mdsip_codec::{array, scalar, Descriptor};

use crate::error::{FrameError, Result};
use crate::header::{MsgHdr, COMPRESSED, HEADER_SIZE, MAX_DIMS};

/// Default cap on a single message, header included.
pub const DEFAULT_MAX_MESSAGE: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Message {
    pub header: MsgHdr,
    pub body: Bytes,
}

impl Message {
    /// A message carrying the null descriptor.
    pub fn missing() -> Self {
        Self {
            header: MsgHdr::default(),
            body: Bytes::new(),
        }
    }

    /// Build a message from a value.
    ///
    /// `compression_level` 0 disables compression; 1 through 9 select
    /// the zlib level. The body is only compressed when that makes it
    /// smaller.
    pub fn from_descriptor(value: &Descriptor, compression_level: u32) -> Result<Self> {
        let mut header = MsgHdr::default();
        let body = match value {
            Descriptor::Missing => Bytes::new(),
            Descriptor::Scalar(s) => {
                header.length = s.wire_length()? as i16;
                header.dtype = s.dtype();
                s.data_bytes()?
            }
            Descriptor::Array(a) => {
                let shape = a.shape();
                if shape.len() > MAX_DIMS {
                    return Err(FrameError::Malformed(
                        "too many array dimensions for a message",
                    ));
                }
                header.length = a.data().element_length() as i16;
                header.dtype = a.dtype();
                header.ndims = shape.len() as u8;
                // Wire order is the reverse of the logical shape.
                for (slot, dim) in header.dims.iter_mut().zip(shape.iter().rev()) {
                    *slot = *dim as i32;
                }
                a.data_bytes()?
            }
            _ => return Err(FrameError::CompositeValue),
        };

        let mut message = Self { header, body };
        message.header.msglen = (HEADER_SIZE + message.body.len()) as i32;

        if compression_level > 0 && !message.body.is_empty() {
            message.compress(compression_level)?;
        }
        Ok(message)
    }

    fn compress(&mut self, level: u32) -> Result<()> {
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
        encoder
            .write_all(&self.body)
            .and_then(|_| encoder.finish())
            .map(|compressed| {
                if compressed.len() < self.body.len() {
                    let original_msglen = self.header.msglen;
                    let mut body = BytesMut::with_capacity(4 + compressed.len());
                    body.extend_from_slice(&original_msglen.to_le_bytes());
                    body.extend_from_slice(&compressed);

                    self.header.client_type |= COMPRESSED;
                    self.body = body.freeze();
                    self.header.msglen = (HEADER_SIZE + self.body.len()) as i32;
                }
            })
            .map_err(FrameError::Compression)
    }

    /// Serialize the message into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut header = self.header;
        header.msglen = (HEADER_SIZE + self.body.len()) as i32;
        header.put(dst);
        dst.extend_from_slice(&self.body);
    }

    /// Decode one message from the front of `src`.
    ///
    /// Returns `Ok(None)` until a complete message is buffered. On
    /// success, consumes the message bytes from the buffer.
    pub fn decode(src: &mut BytesMut, max_message: usize) -> Result<Option<Message>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = MsgHdr::parse(src)?;
        let msglen = header.msglen;
        if msglen < HEADER_SIZE as i32 {
            return Err(FrameError::Malformed(
                "message length shorter than the header",
            ));
        }
        let msglen = msglen as usize;
        if msglen > max_message {
            return Err(FrameError::MessageTooLarge {
                size: msglen,
                max: max_message,
            });
        }

        if src.len() < msglen {
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(msglen - HEADER_SIZE).freeze();
        Ok(Some(Message { header, body }))
    }

    /// Recover the value this message carries.
    ///
    /// Inflates compressed bodies, remaps the legacy float dtype ids
    /// servers leave on converted data, then decodes the body.
    pub fn descriptor(&self) -> Result<Descriptor> {
        let body = if self.header.is_compressed() {
            self.inflate_body()?
        } else {
            self.body.clone()
        };

        // Servers convert legacy float data to IEEE but keep the old
        // dtype id on the reply.
        let dtype_id = match self.header.dtype {
            dtype::F => dtype::FS,
            dtype::D => dtype::FT,
            dtype::FC => dtype::FSC,
            dtype::DC => dtype::FTC,
            other => other,
        };

        if dtype_id == dtype::MISSING || body.is_empty() {
            return Ok(Descriptor::Missing);
        }

        let length = self.header.length as u16;
        if self.header.ndims > 0 {
            let ndims = (self.header.ndims as usize).min(MAX_DIMS);
            // Undo the wire-order reversal.
            let shape: Vec<u32> = self.header.dims[..ndims]
                .iter()
                .rev()
                .map(|d| *d as u32)
                .collect();
            let array = array::unpack_data(dtype_id, length, &shape, &body)?;
            Ok(Descriptor::Array(array))
        } else {
            let value = scalar::unpack_data(dtype_id, length, &body)?;
            Ok(Descriptor::Scalar(value))
        }
    }

    fn inflate_body(&self) -> Result<Bytes> {
        if self.body.len() < 4 {
            return Err(FrameError::Malformed("compressed body shorter than prefix"));
        }
        let declared =
            i32::from_le_bytes([self.body[0], self.body[1], self.body[2], self.body[3]]);
        if declared < HEADER_SIZE as i32 {
            return Err(FrameError::Malformed("compressed body declares bad length"));
        }

        let mut inflated = Vec::new();
        ZlibDecoder::new(&self.body[4..])
            .read_to_end(&mut inflated)
            .map_err(FrameError::Compression)?;

        if inflated.len() != declared as usize - HEADER_SIZE {
            return Err(FrameError::Malformed(
                "decompressed body does not match declared length",
            ));
        }
        Ok(Bytes::from(inflated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdsip_codec::{Apd, Array, ArrayData, Scalar};

    fn roundtrip(value: Descriptor, level: u32) -> Message {
        let message = Message::from_descriptor(&value, level).unwrap();
        let mut wire = BytesMut::new();
        message.encode(&mut wire);
        let decoded = Message::decode(&mut wire, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert!(wire.is_empty());
        assert_eq!(decoded.descriptor().unwrap(), value);
        decoded
    }

    #[test]
    fn scalar_roundtrip() {
        let decoded = roundtrip(Descriptor::Scalar(Scalar::Int32(42)), 0);
        assert_eq!(decoded.header.msglen, 52);
        assert_eq!(decoded.header.length, 4);
    }

    #[test]
    fn text_roundtrip() {
        roundtrip(Descriptor::Scalar(Scalar::Text("SETENV('a=b')".into())), 0);
    }

    #[test]
    fn missing_roundtrip() {
        let decoded = roundtrip(Descriptor::Missing, 0);
        assert!(decoded.body.is_empty());
        assert_eq!(decoded.header.msglen, HEADER_SIZE as i32);
    }

    #[test]
    fn array_dims_are_reversed_on_the_wire() {
        let value = Descriptor::Array(
            Array::new(vec![2, 3], ArrayData::Int32((0..6).collect())).unwrap(),
        );
        let message = Message::from_descriptor(&value, 0).unwrap();
        assert_eq!(message.header.ndims, 2);
        assert_eq!(&message.header.dims[..2], &[3, 2]);
        assert_eq!(message.descriptor().unwrap(), value);
    }

    #[test]
    fn composite_values_rejected() {
        let value = Descriptor::Apd(Apd::List(vec![]));
        assert!(matches!(
            Message::from_descriptor(&value, 0).unwrap_err(),
            FrameError::CompositeValue
        ));
    }

    #[test]
    fn compressible_body_roundtrip() {
        let value = Descriptor::Array(Array::vector(ArrayData::Int32(vec![7; 4096])));
        let message = Message::from_descriptor(&value, 6).unwrap();
        assert!(message.header.is_compressed());
        assert!((message.header.msglen as usize) < HEADER_SIZE + 4096 * 4);
        assert_eq!(message.descriptor().unwrap(), value);
    }

    #[test]
    fn incompressible_body_stays_plain() {
        let message =
            Message::from_descriptor(&Descriptor::Scalar(Scalar::Int32(1)), 9).unwrap();
        assert!(!message.header.is_compressed());
    }

    #[test]
    fn corrupt_compressed_body_rejected() {
        let value = Descriptor::Array(Array::vector(ArrayData::Int32(vec![7; 1024])));
        let message = Message::from_descriptor(&value, 6).unwrap();
        let mut raw = message.body.to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        raw[last - 1] ^= 0xFF;
        let corrupted = Message {
            header: message.header,
            body: Bytes::from(raw),
        };
        assert!(corrupted.descriptor().is_err());
    }

    #[test]
    fn legacy_float_dtype_is_remapped() {
        // A server reply tagged DTYPE_F whose data is already IEEE.
        let mut message = Message::from_descriptor(
            &Descriptor::Scalar(Scalar::Float32(2.5)),
            0,
        )
        .unwrap();
        message.header.dtype = dtype::F;
        assert_eq!(
            message.descriptor().unwrap(),
            Descriptor::Scalar(Scalar::Float32(2.5))
        );
    }

    #[test]
    fn decode_waits_for_full_message() {
        let message =
            Message::from_descriptor(&Descriptor::Scalar(Scalar::Int64(5)), 0).unwrap();
        let mut wire = BytesMut::new();
        message.encode(&mut wire);

        let mut partial = BytesMut::new();
        for chunk in wire.chunks(7) {
            partial.extend_from_slice(chunk);
            if partial.len() < wire.len() {
                assert!(Message::decode(&mut partial, DEFAULT_MAX_MESSAGE)
                    .unwrap()
                    .is_none());
            }
        }
        let decoded = Message::decode(&mut partial, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.header.msglen, 56);
    }

    #[test]
    fn oversized_message_rejected() {
        let message =
            Message::from_descriptor(&Descriptor::Scalar(Scalar::Text("abcdef".into())), 0)
                .unwrap();
        let mut wire = BytesMut::new();
        message.encode(&mut wire);
        assert!(matches!(
            Message::decode(&mut wire, 50).unwrap_err(),
            FrameError::MessageTooLarge { size: 54, max: 50 }
        ));
    }

    #[test]
    fn negative_msglen_rejected() {
        let mut wire = BytesMut::new();
        Message::missing().encode(&mut wire);
        wire[0..4].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(
            Message::decode(&mut wire, DEFAULT_MAX_MESSAGE).unwrap_err(),
            FrameError::Malformed(_)
        ));
    }

    #[test]
    fn decode_waits_for_partial_input() {
        let mut partial = BytesMut::new();
        partial.extend_from_slice(&[0u8; 20]);
        assert!(Message::decode(&mut partial, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .is_none());
    }
}
