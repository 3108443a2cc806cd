//! CLASS_S codec: fixed-width leaf values and ASCII strings.

use bytes::{BufMut, Bytes, BytesMut};

use crate::descriptor::{span, DscHeader, HEADER_SIZE};
use crate::error::{CodecError, Result};
use crate::registry::{class, dtype, dtype_size};
use crate::vaxfloat;

/// One fixed-width primitive or ASCII text value.
///
/// `Text`, `Ident` and `Path` share the text wire layout and differ only
/// in dtype; `Nid` is a 32-bit node id with its own dtype. The legacy VMS
/// float dtypes decode into `Float32`/`Float64` and are never packed.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Ident(String),
    Path(String),
    Nid(u32),
}

impl Scalar {
    pub fn dtype(&self) -> u8 {
        match self {
            Scalar::UInt8(_) => dtype::BU,
            Scalar::UInt16(_) => dtype::WU,
            Scalar::UInt32(_) => dtype::LU,
            Scalar::UInt64(_) => dtype::QU,
            Scalar::Int8(_) => dtype::B,
            Scalar::Int16(_) => dtype::W,
            Scalar::Int32(_) => dtype::L,
            Scalar::Int64(_) => dtype::Q,
            Scalar::Float32(_) => dtype::FS,
            Scalar::Float64(_) => dtype::FT,
            Scalar::Text(_) => dtype::T,
            Scalar::Ident(_) => dtype::IDENT,
            Scalar::Path(_) => dtype::PATH,
            Scalar::Nid(_) => dtype::NID,
        }
    }

    /// The value of the header `length` field: the fixed width for
    /// numerics, the ASCII byte count for text.
    pub fn wire_length(&self) -> Result<u16> {
        match self {
            Scalar::Text(s) | Scalar::Ident(s) | Scalar::Path(s) => u16::try_from(s.len())
                .map_err(|_| CodecError::Malformed("text longer than the u16 length field")),
            // Fixed widths come from the registry; all packable numeric
            // dtypes have one.
            other => Ok(dtype_size(other.dtype()).unwrap_or(0)),
        }
    }

    /// The raw data bytes, without any header.
    pub fn data_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        put_data(self, &mut dst)?;
        Ok(dst.freeze())
    }
}

fn put_data(value: &Scalar, dst: &mut BytesMut) -> Result<()> {
    match value {
        Scalar::UInt8(v) => dst.put_u8(*v),
        Scalar::UInt16(v) => dst.put_u16_le(*v),
        Scalar::UInt32(v) | Scalar::Nid(v) => dst.put_u32_le(*v),
        Scalar::UInt64(v) => dst.put_u64_le(*v),
        Scalar::Int8(v) => dst.put_i8(*v),
        Scalar::Int16(v) => dst.put_i16_le(*v),
        Scalar::Int32(v) => dst.put_i32_le(*v),
        Scalar::Int64(v) => dst.put_i64_le(*v),
        Scalar::Float32(v) => dst.put_f32_le(*v),
        Scalar::Float64(v) => dst.put_f64_le(*v),
        Scalar::Text(s) | Scalar::Ident(s) | Scalar::Path(s) => {
            if !s.is_ascii() {
                return Err(CodecError::NonAsciiText);
            }
            dst.put_slice(s.as_bytes());
        }
    }
    Ok(())
}

/// Pack a scalar as a full CLASS_S descriptor: common header followed by
/// the raw value bytes. The data offset is always the header size.
pub(crate) fn pack(value: &Scalar, dst: &mut BytesMut) -> Result<()> {
    DscHeader {
        length: value.wire_length()?,
        dtype: value.dtype(),
        class: class::S,
        offset: HEADER_SIZE as u32,
    }
    .put(dst);
    put_data(value, dst)
}

/// Unpack a full CLASS_S descriptor.
pub(crate) fn unpack(header: &DscHeader, buf: &[u8]) -> Result<Scalar> {
    // Zero length/offset mean "defaulted": the registry width and the
    // position right after the header.
    let length = match header.length {
        0 => dtype_size(header.dtype).unwrap_or(0),
        n => n,
    };
    let offset = match header.offset {
        0 => HEADER_SIZE,
        n => n as usize,
    };

    let data = span(buf, offset, length as usize)?;
    decode_value(header.dtype, data)
}

/// Unpack scalar data given only the dtype and declared length, as found
/// in a message header (no descriptor header present).
///
/// A zero declared length falls back to the registry width for numeric
/// dtypes, and to "all remaining bytes" for text.
pub fn unpack_data(dtype_id: u8, length: u16, buf: &[u8]) -> Result<Scalar> {
    match dtype_id {
        dtype::T | dtype::IDENT | dtype::PATH => {
            let data = if length > 0 {
                span(buf, 0, length as usize)?
            } else {
                buf
            };
            decode_value(dtype_id, data)
        }
        _ => {
            let width = dtype_size(dtype_id).ok_or(CodecError::UnknownDtypeForClass {
                class: class::S,
                dtype: dtype_id,
            })?;
            decode_value(dtype_id, span(buf, 0, width as usize)?)
        }
    }
}

/// Decode one value of `dtype_id` from exactly-sized data bytes.
fn decode_value(dtype_id: u8, data: &[u8]) -> Result<Scalar> {
    fn fixed<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
        span(data, 0, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&data[..N]);
        Ok(out)
    }

    Ok(match dtype_id {
        dtype::BU => Scalar::UInt8(fixed::<1>(data)?[0]),
        dtype::WU => Scalar::UInt16(u16::from_le_bytes(fixed(data)?)),
        dtype::LU => Scalar::UInt32(u32::from_le_bytes(fixed(data)?)),
        dtype::QU => Scalar::UInt64(u64::from_le_bytes(fixed(data)?)),
        dtype::B => Scalar::Int8(fixed::<1>(data)?[0] as i8),
        dtype::W => Scalar::Int16(i16::from_le_bytes(fixed(data)?)),
        dtype::L => Scalar::Int32(i32::from_le_bytes(fixed(data)?)),
        dtype::Q => Scalar::Int64(i64::from_le_bytes(fixed(data)?)),
        dtype::NID => Scalar::Nid(u32::from_le_bytes(fixed(data)?)),
        dtype::FS => Scalar::Float32(f32::from_le_bytes(fixed(data)?)),
        dtype::FT => Scalar::Float64(f64::from_le_bytes(fixed(data)?)),
        dtype::F => Scalar::Float32(vaxfloat::f_to_f32(fixed(data)?)),
        dtype::D => Scalar::Float64(vaxfloat::d_to_f64(fixed(data)?)),
        dtype::G => Scalar::Float64(vaxfloat::g_to_f64(fixed(data)?)),
        dtype::H => return Err(CodecError::UnsupportedFeature("H_floating")),
        dtype::T | dtype::IDENT | dtype::PATH => {
            if !data.is_ascii() {
                return Err(CodecError::NonAsciiText);
            }
            // ASCII just checked, so UTF-8 conversion cannot fail.
            let text = String::from_utf8_lossy(data).into_owned();
            match dtype_id {
                dtype::IDENT => Scalar::Ident(text),
                dtype::PATH => Scalar::Path(text),
                _ => Scalar::Text(text),
            }
        }
        _ => {
            return Err(CodecError::UnknownDtypeForClass {
                class: class::S,
                dtype: dtype_id,
            })
        }
    })
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::UInt8(v) => write!(f, "{v}BU"),
            Scalar::UInt16(v) => write!(f, "{v}WU"),
            Scalar::UInt32(v) => write!(f, "{v}LU"),
            Scalar::UInt64(v) => write!(f, "{v}QU"),
            Scalar::Int8(v) => write!(f, "{v}B"),
            Scalar::Int16(v) => write!(f, "{v}W"),
            Scalar::Int32(v) => write!(f, "{v}L"),
            Scalar::Int64(v) => write!(f, "{v}Q"),
            Scalar::Float32(v) => write!(f, "{v}"),
            Scalar::Float64(v) => write!(f, "{v}D0"),
            Scalar::Text(s) => write!(f, "\"{s}\""),
            Scalar::Ident(s) => write!(f, "{s}"),
            Scalar::Path(s) => write!(f, "{s}"),
            Scalar::Nid(v) => write!(f, "NID({v})"),
        }
    }
}
