//! MDSplus descriptor binary codec.
//!
//! A descriptor is the self-describing envelope MDSplus uses for every
//! value on the wire: an 8-byte common header (length, dtype, class,
//! offset) followed by a class-specific payload. Four wire shapes exist:
//! - CLASS_S: one fixed-width scalar or an ASCII string
//! - CLASS_A: a flat buffer of homogeneous elements plus an optional
//!   coefficient block carrying the multi-dimensional shape
//! - CLASS_APD: an offset table of nested descriptors (list / tuple /
//!   dictionary)
//! - CLASS_R: a fixed-arity named record (Signal, Action, ...) with an
//!   optional small inline scalar next to its offset table
//!
//! All offsets are absolute byte positions within the descriptor's own
//! buffer, so nested descriptors are self-contained and the whole codec
//! is a pure transformation over byte slices. Every offset and length
//! read from the wire is bounds-checked before use.

pub mod apd;
pub mod array;
pub mod descriptor;
pub mod error;
pub mod record;
pub mod registry;
pub mod scalar;
pub mod vaxfloat;

pub use apd::Apd;
pub use array::{Array, ArrayData};
pub use descriptor::Descriptor;
pub use error::{CodecError, Result};
pub use record::Record;
pub use registry::{classify, class_name, dtype_name, dtype_size, Shape};
pub use scalar::Scalar;
