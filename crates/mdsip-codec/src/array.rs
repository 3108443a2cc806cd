//! CLASS_A / CLASS_CA codec: homogeneous multi-dimensional buffers.
//!
//! The wire form is the common header, an 8-byte array extension
//! (scale, digits, flags, dimension count, total byte size), an optional
//! coefficient block for multi-dimensional shapes, then the raw element
//! bytes. Dimensions in the coefficient block are stored in reverse of
//! their logical order. Element data is written row-major with the
//! `column` flag set; a clear flag marks historical column-major data
//! and is reordered on decode.

use bytes::{BufMut, Bytes, BytesMut};

use crate::descriptor::{span, DscHeader, HEADER_SIZE};
use crate::error::{CodecError, Result};
use crate::registry::{class, dtype, dtype_size};
use crate::vaxfloat;

/// Array extension flag bits.
mod aflags {
    pub const BINSCALE: u8 = 0x08;
    pub const REDIM: u8 = 0x10;
    pub const COLUMN: u8 = 0x20;
    pub const COEFF: u8 = 0x40;
    pub const BOUNDS: u8 = 0x80;
}

/// Size of the array extension that follows the common header.
const EXT_SIZE: usize = 8;

/// Typed element storage for an [`Array`].
///
/// Text arrays are fixed-width: every element occupies `width` bytes on
/// the wire, space-padded on the right.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text { width: u16, elements: Vec<String> },
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::UInt8(v) => v.len(),
            ArrayData::UInt16(v) => v.len(),
            ArrayData::UInt32(v) => v.len(),
            ArrayData::UInt64(v) => v.len(),
            ArrayData::Int8(v) => v.len(),
            ArrayData::Int16(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Text { elements, .. } => elements.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> u8 {
        match self {
            ArrayData::UInt8(_) => dtype::BU,
            ArrayData::UInt16(_) => dtype::WU,
            ArrayData::UInt32(_) => dtype::LU,
            ArrayData::UInt64(_) => dtype::QU,
            ArrayData::Int8(_) => dtype::B,
            ArrayData::Int16(_) => dtype::W,
            ArrayData::Int32(_) => dtype::L,
            ArrayData::Int64(_) => dtype::Q,
            ArrayData::Float32(_) => dtype::FS,
            ArrayData::Float64(_) => dtype::FT,
            ArrayData::Text { .. } => dtype::T,
        }
    }

    /// Per-element byte width on the wire.
    pub fn element_length(&self) -> u16 {
        match self {
            ArrayData::Text { width, .. } => *width,
            other => dtype_size(other.dtype()).unwrap_or(0),
        }
    }

    fn put_elements(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            ArrayData::UInt8(v) => dst.put_slice(v),
            ArrayData::UInt16(v) => v.iter().for_each(|e| dst.put_u16_le(*e)),
            ArrayData::UInt32(v) => v.iter().for_each(|e| dst.put_u32_le(*e)),
            ArrayData::UInt64(v) => v.iter().for_each(|e| dst.put_u64_le(*e)),
            ArrayData::Int8(v) => v.iter().for_each(|e| dst.put_i8(*e)),
            ArrayData::Int16(v) => v.iter().for_each(|e| dst.put_i16_le(*e)),
            ArrayData::Int32(v) => v.iter().for_each(|e| dst.put_i32_le(*e)),
            ArrayData::Int64(v) => v.iter().for_each(|e| dst.put_i64_le(*e)),
            ArrayData::Float32(v) => v.iter().for_each(|e| dst.put_f32_le(*e)),
            ArrayData::Float64(v) => v.iter().for_each(|e| dst.put_f64_le(*e)),
            ArrayData::Text { width, elements } => {
                let width = *width as usize;
                for e in elements {
                    if !e.is_ascii() {
                        return Err(CodecError::NonAsciiText);
                    }
                    if e.len() > width {
                        return Err(CodecError::Malformed(
                            "text array element longer than declared width",
                        ));
                    }
                    dst.put_slice(e.as_bytes());
                    dst.put_bytes(b' ', width - e.len());
                }
            }
        }
        Ok(())
    }
}

/// A shaped homogeneous array.
///
/// `shape` is in logical order (first dimension varies slowest in the
/// row-major element buffer); the wire stores it reversed.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<u32>,
    data: ArrayData,
}

impl Array {
    /// Build an array, validating that the element count matches the
    /// shape's volume.
    pub fn new(shape: Vec<u32>, data: ArrayData) -> Result<Self> {
        if shape.is_empty() {
            return Err(CodecError::Malformed("array shape must have a dimension"));
        }
        let volume = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d as usize))
            .ok_or(CodecError::Malformed("array shape volume overflow"))?;
        if volume != data.len() {
            return Err(CodecError::Malformed(
                "element count does not match array shape",
            ));
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array over existing element storage.
    pub fn vector(data: ArrayData) -> Self {
        Self {
            shape: vec![data.len() as u32],
            data,
        }
    }

    pub fn dtype(&self) -> u8 {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[u32] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Raw row-major element bytes, without any header.
    pub fn data_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.data.put_elements(&mut dst)?;
        Ok(dst.freeze())
    }
}

/// Pack an array as a full CLASS_A descriptor.
pub(crate) fn pack(array: &Array, dst: &mut BytesMut) -> Result<()> {
    let length = array.data.element_length();
    let dimct = array.shape.len();
    if dimct > u8::MAX as usize {
        return Err(CodecError::Malformed("too many array dimensions"));
    }

    let arsize = (array.len() as u64) * (length as u64);
    let arsize = u32::try_from(arsize)
        .map_err(|_| CodecError::Malformed("array data exceeds the u32 size field"))?;

    // The coefficient block is only emitted for multi-dimensional shapes.
    let coeff = dimct > 1;
    let data_offset = if coeff {
        HEADER_SIZE + EXT_SIZE + 4 * (1 + dimct)
    } else {
        HEADER_SIZE + EXT_SIZE
    };

    DscHeader {
        length,
        dtype: array.dtype(),
        class: class::A,
        offset: data_offset as u32,
    }
    .put(dst);

    let mut flags = aflags::REDIM | aflags::COLUMN;
    if coeff {
        flags |= aflags::COEFF;
    }
    dst.put_i8(0); // scale
    dst.put_u8(0); // digits
    dst.put_u8(flags);
    dst.put_u8(dimct as u8);
    dst.put_u32_le(arsize);

    if coeff {
        dst.put_u32_le(data_offset as u32);
        for dim in array.shape.iter().rev() {
            dst.put_u32_le(*dim);
        }
    }

    array.data.put_elements(dst)
}

/// Unpack a full CLASS_A / CLASS_CA descriptor.
pub(crate) fn unpack(header: &DscHeader, buf: &[u8]) -> Result<Array> {
    let ext = span(buf, HEADER_SIZE, EXT_SIZE)?;
    let scale = ext[0] as i8;
    let digits = ext[1];
    let flags = ext[2];
    let dimct = ext[3] as usize;
    let arsize = u32::from_le_bytes([ext[4], ext[5], ext[6], ext[7]]) as usize;

    if scale != 0 || flags & aflags::BINSCALE != 0 {
        return Err(CodecError::UnsupportedFeature("scaled arrays"));
    }
    if digits != 0 {
        return Err(CodecError::UnsupportedFeature("digit-annotated arrays"));
    }
    if flags & aflags::BOUNDS != 0 {
        return Err(CodecError::UnsupportedFeature("bounded arrays"));
    }

    let length = match header.length {
        0 => dtype_size(header.dtype).ok_or(CodecError::Malformed(
            "text array with zero element width",
        ))?,
        n => n,
    } as usize;

    if arsize % length != 0 {
        return Err(CodecError::Malformed(
            "array byte size is not a multiple of the element width",
        ));
    }
    let count = arsize / length;

    let (shape, coeff_size, base_offset) = if flags & aflags::COEFF != 0 {
        if dimct == 0 {
            return Err(CodecError::Malformed("coefficient block with no dimensions"));
        }
        let block = span(buf, HEADER_SIZE + EXT_SIZE, 4 * (1 + dimct))?;
        // a0 is the data start, then the reversed dimension list.
        let base_offset = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let mut shape: Vec<u32> = block[4..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        shape.reverse();
        let volume = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d as usize))
            .ok_or(CodecError::Malformed("array shape volume overflow"))?;
        if volume != count {
            return Err(CodecError::Malformed(
                "dimension product does not match array byte size",
            ));
        }
        (shape, 4 * (1 + dimct), base_offset)
    } else {
        if dimct > 1 {
            return Err(CodecError::Malformed(
                "multi-dimensional array without a coefficient block",
            ));
        }
        (vec![count as u32], 0, 0)
    };

    // The coefficient base offset, when present, names the data start;
    // otherwise the header offset does, defaulting to just past the
    // extension.
    let offset = if base_offset != 0 {
        base_offset as usize
    } else if header.offset != 0 {
        header.offset as usize
    } else {
        HEADER_SIZE + EXT_SIZE + coeff_size
    };
    let raw = span(buf, offset, arsize)?;

    let mut data = decode_elements(header.dtype, length, count, raw)?;
    if flags & aflags::COLUMN == 0 && shape.len() > 1 {
        data = to_row_major(data, &shape);
    }

    Array::new(shape, data)
}

/// Unpack array data given dtype, element width and a logical-order
/// shape, as found in a message header (no descriptor header present).
pub fn unpack_data(dtype_id: u8, length: u16, shape: &[u32], buf: &[u8]) -> Result<Array> {
    let length = match length {
        0 => dtype_size(dtype_id).ok_or(CodecError::Malformed(
            "text array with zero element width",
        ))?,
        n => n,
    } as usize;
    let count = shape
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d as usize))
        .ok_or(CodecError::Malformed("array shape volume overflow"))?;
    let raw = span(buf, 0, count * length)?;
    Array::new(shape.to_vec(), decode_elements(dtype_id, length, count, raw)?)
}

fn decode_elements(dtype_id: u8, length: usize, count: usize, raw: &[u8]) -> Result<ArrayData> {
    fn words<const N: usize, T>(raw: &[u8], f: impl Fn([u8; N]) -> T) -> Vec<T> {
        raw.chunks_exact(N)
            .map(|c| {
                let mut w = [0u8; N];
                w.copy_from_slice(c);
                f(w)
            })
            .collect()
    }

    let expected = dtype_size(dtype_id);
    if let Some(width) = expected {
        if length != width as usize {
            return Err(CodecError::Malformed(
                "element width does not match the dtype's fixed size",
            ));
        }
    }

    Ok(match dtype_id {
        dtype::BU => ArrayData::UInt8(raw.to_vec()),
        dtype::WU => ArrayData::UInt16(words(raw, u16::from_le_bytes)),
        dtype::LU => ArrayData::UInt32(words(raw, u32::from_le_bytes)),
        dtype::QU => ArrayData::UInt64(words(raw, u64::from_le_bytes)),
        dtype::B => ArrayData::Int8(raw.iter().map(|b| *b as i8).collect()),
        dtype::W => ArrayData::Int16(words(raw, i16::from_le_bytes)),
        dtype::L => ArrayData::Int32(words(raw, i32::from_le_bytes)),
        dtype::Q => ArrayData::Int64(words(raw, i64::from_le_bytes)),
        dtype::FS => ArrayData::Float32(words(raw, f32::from_le_bytes)),
        dtype::FT => ArrayData::Float64(words(raw, f64::from_le_bytes)),
        dtype::F => ArrayData::Float32(words(raw, vaxfloat::f_to_f32)),
        dtype::D => ArrayData::Float64(words(raw, vaxfloat::d_to_f64)),
        dtype::G => ArrayData::Float64(words(raw, vaxfloat::g_to_f64)),
        dtype::H => return Err(CodecError::UnsupportedFeature("H_floating")),
        dtype::T => {
            let mut elements = Vec::with_capacity(count);
            for chunk in raw.chunks_exact(length) {
                if !chunk.is_ascii() {
                    return Err(CodecError::NonAsciiText);
                }
                elements.push(String::from_utf8_lossy(chunk).into_owned());
            }
            ArrayData::Text {
                width: length as u16,
                elements,
            }
        }
        _ => {
            return Err(CodecError::UnknownDtypeForClass {
                class: class::A,
                dtype: dtype_id,
            })
        }
    })
}

/// Reorder column-major elements into row-major for the given shape.
fn to_row_major(data: ArrayData, shape: &[u32]) -> ArrayData {
    fn permute<T: Clone>(v: Vec<T>, shape: &[u32]) -> Vec<T> {
        let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
        let n = v.len();
        let mut out = Vec::with_capacity(n);
        for row_idx in 0..n {
            // Decompose the row-major index into coordinates, then
            // recompose it column-major to find the source position.
            let mut rem = row_idx;
            let mut coords = vec![0usize; dims.len()];
            for (i, d) in dims.iter().enumerate().rev() {
                coords[i] = rem % d;
                rem /= d;
            }
            let mut col_idx = 0;
            let mut stride = 1;
            for (c, d) in coords.iter().zip(dims.iter()) {
                col_idx += c * stride;
                stride *= d;
            }
            out.push(v[col_idx].clone());
        }
        out
    }

    match data {
        ArrayData::UInt8(v) => ArrayData::UInt8(permute(v, shape)),
        ArrayData::UInt16(v) => ArrayData::UInt16(permute(v, shape)),
        ArrayData::UInt32(v) => ArrayData::UInt32(permute(v, shape)),
        ArrayData::UInt64(v) => ArrayData::UInt64(permute(v, shape)),
        ArrayData::Int8(v) => ArrayData::Int8(permute(v, shape)),
        ArrayData::Int16(v) => ArrayData::Int16(permute(v, shape)),
        ArrayData::Int32(v) => ArrayData::Int32(permute(v, shape)),
        ArrayData::Int64(v) => ArrayData::Int64(permute(v, shape)),
        ArrayData::Float32(v) => ArrayData::Float32(permute(v, shape)),
        ArrayData::Float64(v) => ArrayData::Float64(permute(v, shape)),
        ArrayData::Text { width, elements } => ArrayData::Text {
            width,
            elements: permute(elements, shape),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    fn roundtrip(array: Array) {
        let packed = Descriptor::Array(array.clone()).pack().unwrap();
        let back = Descriptor::unpack(&packed).unwrap();
        assert_eq!(back, Descriptor::Array(array));
    }

    #[test]
    fn one_dimensional_wire_layout() {
        let array = Array::vector(ArrayData::Int32(vec![1, 2, 3]));
        let packed = Descriptor::Array(array).pack().unwrap();
        // 8 header + 8 extension + 3 * 4 data, no coefficient block.
        assert_eq!(packed.len(), 28);
        assert_eq!(packed[2], dtype::L);
        assert_eq!(packed[3], class::A);
        assert_eq!(u32::from_le_bytes([packed[4], packed[5], packed[6], packed[7]]), 16);
        // flags: redimensionable + row-major, no coeff.
        assert_eq!(packed[10], 0x30);
        assert_eq!(packed[11], 1);
        assert_eq!(u32::from_le_bytes([packed[12], packed[13], packed[14], packed[15]]), 12);
        assert_eq!(&packed[16..20], &[1, 0, 0, 0]);
    }

    #[test]
    fn roundtrip_one_dimensional() {
        roundtrip(Array::vector(ArrayData::Float64(vec![1.5, -2.5, 3.25])));
        roundtrip(Array::vector(ArrayData::UInt8(vec![0, 255, 7])));
        roundtrip(Array::vector(ArrayData::Int64(vec![i64::MIN, 0, i64::MAX])));
    }

    #[test]
    fn roundtrip_three_dimensional() {
        let data: Vec<i32> = (0..24).collect();
        let array = Array::new(vec![2, 3, 4], ArrayData::Int32(data)).unwrap();
        let packed = Descriptor::Array(array.clone()).pack().unwrap();
        // Coefficient block present: a0 plus three reversed dims.
        assert_eq!(packed[10], 0x70);
        assert_eq!(packed[11], 3);
        let dims: Vec<u32> = packed[20..32]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(dims, vec![4, 3, 2]);
        assert_eq!(Descriptor::unpack(&packed).unwrap(), Descriptor::Array(array));
    }

    #[test]
    fn roundtrip_text_array() {
        let array = Array::vector(ArrayData::Text {
            width: 4,
            elements: vec!["abcd".into(), "ef  ".into()],
        });
        roundtrip(array);
    }

    #[test]
    fn column_major_input_is_reordered() {
        let row = Array::new(vec![2, 3], ArrayData::Int32((0..6).collect())).unwrap();
        let mut packed = Descriptor::Array(row.clone()).pack().unwrap().to_vec();
        // Clear the row-major flag and store the elements column-major.
        packed[10] &= !0x20;
        // Header (8) + extension (8) + a0 and two dims (12) puts the
        // element data at byte 28.
        let col_order = [0i32, 3, 1, 4, 2, 5];
        for (i, v) in col_order.iter().enumerate() {
            packed[28 + 4 * i..32 + 4 * i].copy_from_slice(&v.to_le_bytes());
        }
        assert_eq!(Descriptor::unpack(&packed).unwrap(), Descriptor::Array(row));
    }

    #[test]
    fn scaled_arrays_rejected() {
        let mut packed = Descriptor::Array(Array::vector(ArrayData::Int16(vec![1])))
            .pack()
            .unwrap()
            .to_vec();
        packed[8] = 2; // scale
        let err = Descriptor::unpack(&packed).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedFeature("scaled arrays")));
    }

    #[test]
    fn binscale_flag_rejected() {
        let mut packed = Descriptor::Array(Array::vector(ArrayData::Int16(vec![1])))
            .pack()
            .unwrap()
            .to_vec();
        packed[10] |= 0x08;
        assert!(matches!(
            Descriptor::unpack(&packed).unwrap_err(),
            CodecError::UnsupportedFeature("scaled arrays")
        ));
    }

    #[test]
    fn arsize_must_divide_by_element_width() {
        let mut packed = Descriptor::Array(Array::vector(ArrayData::Int32(vec![1, 2])))
            .pack()
            .unwrap()
            .to_vec();
        packed[12] = 7; // arsize no longer a multiple of 4
        assert!(matches!(
            Descriptor::unpack(&packed).unwrap_err(),
            CodecError::Malformed(_)
        ));
    }

    #[test]
    fn truncated_data_detected() {
        let packed = Descriptor::Array(Array::vector(ArrayData::Int32(vec![1, 2, 3])))
            .pack()
            .unwrap();
        let err = Descriptor::unpack(&packed[..packed.len() - 2]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn shape_volume_must_match_element_count() {
        let err = Array::new(vec![2, 2], ArrayData::Int32(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
