//! Static type registry: valid (class, dtype) pairs and fixed widths.
//!
//! Read-only lookup tables, shared by every codec. The numeric codes are
//! the MDSplus wire values and must not be renumbered.

use crate::error::{CodecError, Result};

/// Descriptor class codes.
pub mod class {
    pub const MISSING: u8 = 0;
    pub const S: u8 = 1;
    pub const A: u8 = 4;
    pub const R: u8 = 194;
    pub const CA: u8 = 195;
    pub const APD: u8 = 196;
}

/// Descriptor dtype codes.
pub mod dtype {
    pub const MISSING: u8 = 0;
    pub const BU: u8 = 2;
    pub const WU: u8 = 3;
    pub const LU: u8 = 4;
    pub const QU: u8 = 5;
    pub const B: u8 = 6;
    pub const W: u8 = 7;
    pub const L: u8 = 8;
    pub const Q: u8 = 9;
    /// VMS F_floating, decode-only.
    pub const F: u8 = 10;
    /// VMS D_floating, decode-only.
    pub const D: u8 = 11;
    pub const FC: u8 = 12;
    pub const DC: u8 = 13;
    pub const T: u8 = 14;
    /// VMS G_floating, decode-only.
    pub const G: u8 = 27;
    /// VMS H_floating, explicitly unsupported.
    pub const H: u8 = 28;
    pub const FS: u8 = 52;
    pub const FT: u8 = 53;
    pub const FSC: u8 = 54;
    pub const FTC: u8 = 55;
    pub const IDENT: u8 = 191;
    pub const NID: u8 = 192;
    pub const PATH: u8 = 193;
    pub const SIGNAL: u8 = 195;
    pub const DIMENSION: u8 = 196;
    pub const WINDOW: u8 = 197;
    pub const SLOPE: u8 = 198;
    pub const FUNCTION: u8 = 199;
    pub const CONGLOM: u8 = 200;
    pub const RANGE: u8 = 201;
    pub const ACTION: u8 = 202;
    pub const DISPATCH: u8 = 203;
    pub const PROGRAM: u8 = 204;
    pub const ROUTINE: u8 = 205;
    pub const PROCEDURE: u8 = 206;
    pub const METHOD: u8 = 207;
    pub const DEPENDENCY: u8 = 208;
    pub const CONDITION: u8 = 209;
    pub const WITH_UNITS: u8 = 211;
    pub const CALL: u8 = 212;
    pub const WITH_ERROR: u8 = 213;
    pub const LIST: u8 = 214;
    pub const TUPLE: u8 = 215;
    pub const DICTIONARY: u8 = 216;
    pub const OPAQUE: u8 = 217;
}

/// The structural wire shape a (class, dtype) pair decodes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The null descriptor.
    Missing,
    /// CLASS_S fixed-width value or string.
    Scalar,
    /// CLASS_A / CLASS_CA homogeneous element buffer.
    Array,
    /// CLASS_APD offset table (list / tuple / dictionary).
    PointerArray,
    /// CLASS_R named composite record.
    Record,
}

const SCALAR_DTYPES: &[u8] = &[
    dtype::T,
    dtype::IDENT,
    dtype::PATH,
    dtype::NID,
    dtype::BU,
    dtype::WU,
    dtype::LU,
    dtype::QU,
    dtype::B,
    dtype::W,
    dtype::L,
    dtype::Q,
    dtype::FS,
    dtype::F,
    dtype::FT,
    dtype::D,
    dtype::G,
    dtype::H,
];

const ARRAY_DTYPES: &[u8] = &[
    dtype::T,
    dtype::BU,
    dtype::WU,
    dtype::LU,
    dtype::QU,
    dtype::B,
    dtype::W,
    dtype::L,
    dtype::Q,
    dtype::FS,
    dtype::F,
    dtype::FT,
    dtype::D,
    dtype::G,
    dtype::H,
];

const APD_DTYPES: &[u8] = &[dtype::LIST, dtype::TUPLE, dtype::DICTIONARY];

const RECORD_DTYPES: &[u8] = &[
    dtype::SIGNAL,
    dtype::DIMENSION,
    dtype::WINDOW,
    dtype::SLOPE,
    dtype::FUNCTION,
    dtype::CONGLOM,
    dtype::RANGE,
    dtype::ACTION,
    dtype::DISPATCH,
    dtype::PROGRAM,
    dtype::ROUTINE,
    dtype::PROCEDURE,
    dtype::METHOD,
    dtype::DEPENDENCY,
    dtype::CONDITION,
    dtype::WITH_UNITS,
    dtype::CALL,
    dtype::WITH_ERROR,
    dtype::OPAQUE,
];

/// Validate a (class, dtype) pair and return the wire shape it decodes with.
///
/// A dtype of `MISSING` is valid under every class and decodes to the null
/// descriptor.
pub fn classify(class: u8, dtype_id: u8) -> Result<Shape> {
    let (shape, valid): (Shape, &[u8]) = match class {
        class::MISSING => return Ok(Shape::Missing),
        class::S => (Shape::Scalar, SCALAR_DTYPES),
        class::A | class::CA => (Shape::Array, ARRAY_DTYPES),
        class::APD => (Shape::PointerArray, APD_DTYPES),
        class::R => (Shape::Record, RECORD_DTYPES),
        _ => return Err(CodecError::UnknownClass { class }),
    };

    if dtype_id == dtype::MISSING {
        return Ok(Shape::Missing);
    }

    if valid.contains(&dtype_id) {
        Ok(shape)
    } else {
        Err(CodecError::UnknownDtypeForClass {
            class,
            dtype: dtype_id,
        })
    }
}

/// Fixed element width in bytes for a dtype, or `None` for variable-width
/// (text) and composite dtypes.
pub fn dtype_size(dtype_id: u8) -> Option<u16> {
    match dtype_id {
        dtype::BU | dtype::B => Some(1),
        dtype::WU | dtype::W => Some(2),
        dtype::LU | dtype::L | dtype::NID | dtype::FS | dtype::F => Some(4),
        dtype::QU | dtype::Q | dtype::FT | dtype::D | dtype::G => Some(8),
        dtype::H => Some(16),
        _ => None,
    }
}

/// Human-readable name of a dtype code, for error messages and logs.
pub fn dtype_name(dtype_id: u8) -> &'static str {
    match dtype_id {
        dtype::MISSING => "MISSING",
        dtype::BU => "BU",
        dtype::WU => "WU",
        dtype::LU => "LU",
        dtype::QU => "QU",
        dtype::B => "B",
        dtype::W => "W",
        dtype::L => "L",
        dtype::Q => "Q",
        dtype::F => "F",
        dtype::D => "D",
        dtype::FC => "FC",
        dtype::DC => "DC",
        dtype::T => "T",
        dtype::G => "G",
        dtype::H => "H",
        dtype::FS => "FS",
        dtype::FT => "FT",
        dtype::FSC => "FSC",
        dtype::FTC => "FTC",
        dtype::IDENT => "IDENT",
        dtype::NID => "NID",
        dtype::PATH => "PATH",
        dtype::SIGNAL => "SIGNAL",
        dtype::DIMENSION => "DIMENSION",
        dtype::WINDOW => "WINDOW",
        dtype::SLOPE => "SLOPE",
        dtype::FUNCTION => "FUNCTION",
        dtype::CONGLOM => "CONGLOM",
        dtype::RANGE => "RANGE",
        dtype::ACTION => "ACTION",
        dtype::DISPATCH => "DISPATCH",
        dtype::PROGRAM => "PROGRAM",
        dtype::ROUTINE => "ROUTINE",
        dtype::PROCEDURE => "PROCEDURE",
        dtype::METHOD => "METHOD",
        dtype::DEPENDENCY => "DEPENDENCY",
        dtype::CONDITION => "CONDITION",
        dtype::WITH_UNITS => "WITH_UNITS",
        dtype::CALL => "CALL",
        dtype::WITH_ERROR => "WITH_ERROR",
        dtype::LIST => "LIST",
        dtype::TUPLE => "TUPLE",
        dtype::DICTIONARY => "DICTIONARY",
        dtype::OPAQUE => "OPAQUE",
        _ => "UNKNOWN",
    }
}

/// Human-readable name of a class code.
pub fn class_name(class: u8) -> &'static str {
    match class {
        class::MISSING => "MISSING",
        class::S => "S",
        class::A => "A",
        class::R => "R",
        class::CA => "CA",
        class::APD => "APD",
        _ => "UNKNOWN",
    }
}
