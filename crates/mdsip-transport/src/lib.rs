//! TCP transport for MDSip connections.
//!
//! A thin layer over `std::net::TcpStream`: host resolution with the
//! well-known default port, connect timeouts, and a stream type that
//! implements `Read` and `Write` for the framing layer.

pub mod error;
pub mod tcp;

pub use error::{Result, TransportError};
pub use tcp::TcpLink;
