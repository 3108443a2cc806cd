//! A blocking client connection that evaluates remote expressions.

use std::io::{Read, Write};
use std::time::Duration;

use mdsip_codec::{Array, ArrayData, Descriptor, Scalar};
use mdsip_frame::{Message, MessageReader, MessageWriter};
use mdsip_transport::TcpLink;
use tracing::debug;

use crate::error::{ClientError, Result};

/// A connection to an MDSip server over any duplex byte stream.
///
/// An expression call is `1 + N` messages sharing a message id: the
/// expression text first, then each argument tagged with its position.
/// The server answers with a single reply message.
pub struct Connection<S> {
    reader: MessageReader<S>,
    message_id: u8,
    compression_level: u32,
}

impl Connection<TcpLink> {
    /// Connect to `host` (optionally `host:port`) over TCP.
    pub fn connect(host: &str) -> Result<Self> {
        Ok(Self::new(TcpLink::connect(host)?))
    }

    /// Connect with a per-address timeout.
    pub fn connect_timeout(host: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::new(TcpLink::connect_timeout(host, timeout)?))
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: MessageReader::new(stream),
            message_id: 0,
            compression_level: 0,
        }
    }

    /// Select the zlib level for outgoing bodies; 0 disables.
    pub fn set_compression_level(&mut self, level: u32) {
        self.compression_level = level;
    }

    /// Cap the size of a single incoming message.
    pub fn set_max_message(&mut self, max_message: usize) {
        self.reader.set_max_message(max_message);
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    /// Evaluate an expression on the server and return the result.
    ///
    /// `args` fill the `$` placeholders in the expression, in order.
    /// A blank expression evaluates to the null descriptor locally.
    pub fn get(&mut self, expr: &str, args: &[Descriptor]) -> Result<Descriptor> {
        if expr.trim().is_empty() {
            return Ok(Descriptor::Missing);
        }
        if args.len() > u8::MAX as usize - 1 {
            return Err(ClientError::TooManyArguments(args.len()));
        }

        let nargs = 1 + args.len() as u8;
        self.message_id = self.message_id.wrapping_add(1);
        let message_id = self.message_id;
        debug!(expr, nargs, message_id, "evaluating expression");

        let mut head = Message::from_descriptor(
            &Descriptor::Scalar(Scalar::Text(expr.to_string())),
            self.compression_level,
        )?;
        head.header.nargs = nargs;
        head.header.message_id = message_id;
        self.send(&head)?;

        for (i, arg) in args.iter().enumerate() {
            let mut msg = Message::from_descriptor(arg, self.compression_level)?;
            msg.header.nargs = nargs;
            msg.header.message_id = message_id;
            msg.header.descriptor_idx = (i + 1) as u8;
            self.send(&msg)?;
        }

        let reply = self.recv()?;
        // The low status bit clear means failure.
        if reply.header.status & 1 == 0 {
            return Err(ClientError::ServerStatus {
                status: reply.header.status,
            });
        }

        Ok(reply.descriptor()?)
    }

    /// Evaluate an expression whose result may be a composite value.
    ///
    /// The expression is wrapped in `SerializeOut`, so the server
    /// returns a byte array holding a packed descriptor, which is then
    /// unpacked locally. This is the only way to retrieve records,
    /// lists, tuples and dictionaries.
    pub fn get_object(&mut self, expr: &str, args: &[Descriptor]) -> Result<Descriptor> {
        let wrapped = format!("SerializeOut(`({expr};))");
        match self.get(&wrapped, args)? {
            Descriptor::Missing => Ok(Descriptor::Missing),
            Descriptor::Array(array) => {
                let serialized = byte_payload(array)?;
                Ok(Descriptor::unpack(&serialized)?)
            }
            _ => Err(ClientError::UnexpectedReply(
                "serialized result was not a byte array",
            )),
        }
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        MessageWriter::new(self.reader.get_mut()).write_message(message)?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Message> {
        Ok(self.reader.read_message()?)
    }
}

/// Extract the raw bytes of a serialized-descriptor reply.
fn byte_payload(array: Array) -> Result<Vec<u8>> {
    match array.into_data() {
        ArrayData::UInt8(bytes) => Ok(bytes),
        ArrayData::Int8(bytes) => Ok(bytes.into_iter().map(|b| b as u8).collect()),
        _ => Err(ClientError::UnexpectedReply(
            "serialized result was not a byte array",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_expression_is_local_missing() {
        // A connection over a stream that fails on any use; the blank
        // expression must never touch it.
        struct Dead;
        impl Read for Dead {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                panic!("read on dead stream")
            }
        }
        impl Write for Dead {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                panic!("write on dead stream")
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut conn = Connection::new(Dead);
        assert_eq!(conn.get("   ", &[]).unwrap(), Descriptor::Missing);
    }
}
