//! Client for the MDSip protocol.
//!
//! This crate ties the layers together: [`mdsip_codec`] packs and
//! unpacks descriptor buffers, [`mdsip_frame`] frames them into
//! messages, [`mdsip_transport`] carries them over TCP, and
//! [`Connection`] speaks the expression-call protocol on top.
//!
//! ```no_run
//! use mdsip::{Connection, Descriptor, Scalar};
//!
//! fn main() -> mdsip::Result<()> {
//!     let mut conn = Connection::connect("mds.example.org")?;
//!     let answer = conn.get("$ + 1", &[Descriptor::Scalar(Scalar::Int32(41))])?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;

pub use connection::Connection;
pub use error::{ClientError, Result};

pub use mdsip_codec::{
    Apd, Array, ArrayData, CodecError, Descriptor, Record, Scalar,
};
pub use mdsip_frame::{FrameError, Message, MessageReader, MessageWriter, MsgHdr};
pub use mdsip_transport::{TcpLink, TransportError};
