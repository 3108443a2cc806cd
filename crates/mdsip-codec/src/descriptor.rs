//! The descriptor value model and the top-level pack/unpack entry points.

use bytes::{Bytes, BytesMut};

use crate::apd::Apd;
use crate::array::Array;
use crate::error::{CodecError, Result};
use crate::record::Record;
use crate::registry::{self, class, classify, dtype, Shape};
use crate::scalar::Scalar;
use crate::{apd, array, record, scalar};

/// Size of the common descriptor header shared by every class.
pub const HEADER_SIZE: usize = 8;

/// Maximum nesting depth accepted while decoding. Offsets in the buffer
/// are attacker-controllable, so recursion must be bounded.
pub(crate) const MAX_DEPTH: usize = 64;

/// One MDSplus value in any of its four wire shapes.
///
/// `Missing` is the null descriptor; it is a legal value everywhere a
/// descriptor can appear (an empty APD slot, an omitted record field, an
/// empty server reply) and is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Missing,
    Scalar(Scalar),
    Array(Array),
    Apd(Apd),
    Record(Box<Record>),
}

/// The 8-byte common header: length, dtype, class, offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DscHeader {
    pub length: u16,
    pub dtype: u8,
    pub class: u8,
    pub offset: u32,
}

impl DscHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self> {
        let head = span(buf, 0, HEADER_SIZE)?;
        Ok(Self {
            length: u16::from_le_bytes([head[0], head[1]]),
            dtype: head[2],
            class: head[3],
            offset: u32::from_le_bytes([head[4], head[5], head[6], head[7]]),
        })
    }

    pub(crate) fn put(&self, dst: &mut BytesMut) {
        use bytes::BufMut;
        dst.put_u16_le(self.length);
        dst.put_u8(self.dtype);
        dst.put_u8(self.class);
        dst.put_u32_le(self.offset);
    }
}

/// Bounds-checked subslice: `buf[offset .. offset + len]`.
pub(crate) fn span(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or(CodecError::Malformed("offset arithmetic overflow"))?;
    buf.get(offset..end).ok_or(CodecError::Truncated {
        needed: end,
        have: buf.len(),
    })
}

impl Descriptor {
    /// True for the null descriptor.
    pub fn is_missing(&self) -> bool {
        matches!(self, Descriptor::Missing)
    }

    /// The wire dtype this value packs with.
    pub fn dtype(&self) -> u8 {
        match self {
            Descriptor::Missing => dtype::MISSING,
            Descriptor::Scalar(s) => s.dtype(),
            Descriptor::Array(a) => a.dtype(),
            Descriptor::Apd(p) => p.dtype(),
            Descriptor::Record(r) => r.dtype(),
        }
    }

    /// The wire class this value packs with.
    pub fn class(&self) -> u8 {
        match self {
            Descriptor::Missing => class::MISSING,
            Descriptor::Scalar(_) => class::S,
            Descriptor::Array(_) => class::A,
            Descriptor::Apd(_) => class::APD,
            Descriptor::Record(_) => class::R,
        }
    }

    /// Serialize into a self-contained descriptor buffer.
    ///
    /// The null descriptor packs to an all-zero header.
    pub fn pack(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.pack_into(&mut dst)?;
        Ok(dst.freeze())
    }

    pub(crate) fn pack_into(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Descriptor::Missing => {
                DscHeader {
                    length: 0,
                    dtype: dtype::MISSING,
                    class: class::MISSING,
                    offset: 0,
                }
                .put(dst);
                Ok(())
            }
            Descriptor::Scalar(s) => scalar::pack(s, dst),
            Descriptor::Array(a) => array::pack(a, dst),
            Descriptor::Apd(p) => apd::pack(p, dst),
            Descriptor::Record(r) => record::pack(r, dst),
        }
    }

    /// Decode a self-contained descriptor buffer produced by [`pack`] or
    /// by a server's `SerializeOut`.
    ///
    /// [`pack`]: Descriptor::pack
    pub fn unpack(buf: &[u8]) -> Result<Descriptor> {
        Self::unpack_at(buf, 0)
    }

    pub(crate) fn unpack_at(buf: &[u8], depth: usize) -> Result<Descriptor> {
        if depth > MAX_DEPTH {
            return Err(CodecError::Malformed("descriptor nesting too deep"));
        }

        let header = DscHeader::parse(buf)?;
        match classify(header.class, header.dtype)? {
            Shape::Missing => Ok(Descriptor::Missing),
            Shape::Scalar => scalar::unpack(&header, buf).map(Descriptor::Scalar),
            Shape::Array => array::unpack(&header, buf).map(Descriptor::Array),
            Shape::PointerArray => apd::unpack(&header, buf, depth).map(Descriptor::Apd),
            Shape::Record => {
                record::unpack(&header, buf, depth).map(|r| Descriptor::Record(Box::new(r)))
            }
        }
    }
}

impl From<Scalar> for Descriptor {
    fn from(value: Scalar) -> Self {
        Descriptor::Scalar(value)
    }
}

impl From<Array> for Descriptor {
    fn from(value: Array) -> Self {
        Descriptor::Array(value)
    }
}

impl From<Apd> for Descriptor {
    fn from(value: Apd) -> Self {
        Descriptor::Apd(value)
    }
}

impl From<Record> for Descriptor {
    fn from(value: Record) -> Self {
        Descriptor::Record(Box::new(value))
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Descriptor::Missing => write!(f, "*"),
            Descriptor::Scalar(s) => write!(f, "{s}"),
            Descriptor::Array(a) => write!(
                f,
                "{}[{}]",
                registry::dtype_name(a.dtype()),
                a.shape()
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Descriptor::Apd(p) => write!(f, "{}({})", registry::dtype_name(p.dtype()), p.len()),
            Descriptor::Record(r) => write!(f, "{}", registry::dtype_name(r.dtype())),
        }
    }
}
