//! CLASS_APD codec: lists, tuples and dictionaries.
//!
//! An APD is an array of 32-bit descriptor offsets. Each slot holds the
//! absolute byte offset (from the start of the APD) of a nested packed
//! descriptor, or zero for an empty slot. Dictionaries alternate key and
//! value slots; keys must be scalars.

use bytes::{BufMut, BytesMut};

use crate::descriptor::{span, Descriptor, DscHeader, HEADER_SIZE};
use crate::error::{CodecError, Result};
use crate::registry::{class, dtype};
use crate::scalar::Scalar;

/// Byte width of one offset slot.
const SLOT_SIZE: usize = 4;

/// Offset of the slot table from the start of the APD.
const TABLE_OFFSET: usize = 16;

/// An ordered collection of nested descriptors.
#[derive(Debug, Clone, PartialEq)]
pub enum Apd {
    List(Vec<Descriptor>),
    Tuple(Vec<Descriptor>),
    Dictionary(Vec<(Scalar, Descriptor)>),
}

impl Apd {
    pub fn dtype(&self) -> u8 {
        match self {
            Apd::List(_) => dtype::LIST,
            Apd::Tuple(_) => dtype::TUPLE,
            Apd::Dictionary(_) => dtype::DICTIONARY,
        }
    }

    /// Number of entries: elements for lists and tuples, pairs for
    /// dictionaries.
    pub fn len(&self) -> usize {
        match self {
            Apd::List(v) | Apd::Tuple(v) => v.len(),
            Apd::Dictionary(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pack an APD as a full CLASS_APD descriptor.
pub(crate) fn pack(apd: &Apd, dst: &mut BytesMut) -> Result<()> {
    // Dictionaries interleave packed key scalars with their values.
    let children: Vec<Option<Vec<u8>>> = match apd {
        Apd::Dictionary(pairs) => {
            let mut out = Vec::with_capacity(pairs.len() * 2);
            for (key, value) in pairs {
                let mut kb = BytesMut::new();
                crate::scalar::pack(key, &mut kb)?;
                out.push(Some(kb.to_vec()));
                out.push(pack_child(value)?);
            }
            out
        }
        Apd::List(v) | Apd::Tuple(v) => v.iter().map(pack_child).collect::<Result<_>>()?,
    };

    let count = children.len();
    let arsize = count
        .checked_mul(SLOT_SIZE)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(CodecError::Malformed("too many descriptor slots"))?;

    DscHeader {
        length: SLOT_SIZE as u16,
        dtype: apd.dtype(),
        class: class::APD,
        offset: 0,
    }
    .put(dst);
    dst.put_i8(0); // scale
    dst.put_u8(0); // digits
    dst.put_u8(0x30); // redimensionable, row-major
    dst.put_u8(1); // dimct
    dst.put_u32_le(arsize);

    // Slot table first, then the nested descriptors it points at.
    let mut next = TABLE_OFFSET + count * SLOT_SIZE;
    for child in &children {
        match child {
            Some(bytes) => {
                dst.put_u32_le(next as u32);
                next += bytes.len();
            }
            None => dst.put_u32_le(0),
        }
    }
    for child in children.into_iter().flatten() {
        dst.put_slice(&child);
    }
    Ok(())
}

fn pack_child(child: &Descriptor) -> Result<Option<Vec<u8>>> {
    if child.is_missing() {
        return Ok(None);
    }
    Ok(Some(child.pack()?.to_vec()))
}

/// Unpack a full CLASS_APD descriptor.
pub(crate) fn unpack(header: &DscHeader, buf: &[u8], depth: usize) -> Result<Apd> {
    if header.length != 0 && header.length as usize != SLOT_SIZE {
        return Err(CodecError::Malformed("descriptor slot width must be 4"));
    }

    let ext = span(buf, HEADER_SIZE, 8)?;
    let arsize = u32::from_le_bytes([ext[4], ext[5], ext[6], ext[7]]) as usize;
    if arsize % SLOT_SIZE != 0 {
        return Err(CodecError::Malformed(
            "slot table size is not a multiple of 4",
        ));
    }
    let count = arsize / SLOT_SIZE;

    let table_offset = match header.offset {
        0 => TABLE_OFFSET,
        n => n as usize,
    };
    let table = span(buf, table_offset, arsize)?;

    let mut slots = Vec::with_capacity(count);
    for raw in table.chunks_exact(SLOT_SIZE) {
        let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        if offset == 0 {
            slots.push(Descriptor::Missing);
        } else {
            let nested = buf
                .get(offset..)
                .ok_or(CodecError::Malformed("slot offset outside the descriptor"))?;
            slots.push(Descriptor::unpack_at(nested, depth + 1)?);
        }
    }

    match header.dtype {
        dtype::LIST => Ok(Apd::List(slots)),
        dtype::TUPLE => Ok(Apd::Tuple(slots)),
        dtype::DICTIONARY => {
            if slots.len() % 2 != 0 {
                return Err(CodecError::Malformed(
                    "dictionary with an odd number of slots",
                ));
            }
            let mut pairs = Vec::with_capacity(slots.len() / 2);
            let mut iter = slots.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                match key {
                    Descriptor::Scalar(k) => pairs.push((k, value)),
                    _ => {
                        return Err(CodecError::Malformed(
                            "dictionary key must be a scalar",
                        ))
                    }
                }
            }
            Ok(Apd::Dictionary(pairs))
        }
        other => Err(CodecError::UnknownDtypeForClass {
            class: class::APD,
            dtype: other,
        }),
    }
}
