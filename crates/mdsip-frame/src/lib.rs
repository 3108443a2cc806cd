//! MDSip message framing.
//!
//! Every message starts with a fixed 48-byte little-endian header
//! carrying the total length, a status word, call bookkeeping
//! (argument count, descriptor index, message id) and the dtype and
//! shape of the body. The body is the data-only serialization of a
//! missing, scalar or array value, optionally zlib-compressed.
//!
//! No partial reads, no buffer management in user code.

pub mod error;
pub mod header;
pub mod message;
pub mod reader;
pub mod writer;

pub use error::{FrameError, Result};
pub use header::{MsgHdr, COMPRESSED, HEADER_SIZE, IEEE_CLIENT, MAX_DIMS};
pub use message::{Message, DEFAULT_MAX_MESSAGE};
pub use reader::MessageReader;
pub use writer::MessageWriter;
