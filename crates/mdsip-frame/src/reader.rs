use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::message::{Message, DEFAULT_MAX_MESSAGE};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete
/// messages.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    max_message: usize,
}

impl<T: Read> MessageReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_message(inner, DEFAULT_MAX_MESSAGE)
    }

    pub fn with_max_message(inner: T, max_message: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_message,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// EOF on a message boundary is `ConnectionClosed`; EOF with a
    /// partial message buffered is `Truncated`.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = Message::decode(&mut self.buf, self.max_message)? {
                trace!(
                    msglen = message.header.msglen,
                    message_id = message.header.message_id,
                    "received message"
                );
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(FrameError::Truncated {
                    have: self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the maximum message size for subsequent reads.
    pub fn set_max_message(&mut self, max_message: usize) {
        self.max_message = max_message;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use mdsip_codec::{Descriptor, Scalar};

    use super::*;

    fn wire(values: &[Descriptor]) -> Vec<u8> {
        let mut out = BytesMut::new();
        for value in values {
            Message::from_descriptor(value, 0).unwrap().encode(&mut out);
        }
        out.to_vec()
    }

    #[test]
    fn read_single_message() {
        let bytes = wire(&[Descriptor::Scalar(Scalar::Int32(1))]);
        let mut reader = MessageReader::new(Cursor::new(bytes));
        let message = reader.read_message().unwrap();
        assert_eq!(
            message.descriptor().unwrap(),
            Descriptor::Scalar(Scalar::Int32(1))
        );
    }

    #[test]
    fn read_back_to_back_messages() {
        let bytes = wire(&[
            Descriptor::Scalar(Scalar::Int32(1)),
            Descriptor::Scalar(Scalar::Text("two".into())),
            Descriptor::Missing,
        ]);
        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert_eq!(
            reader.read_message().unwrap().descriptor().unwrap(),
            Descriptor::Scalar(Scalar::Int32(1))
        );
        assert_eq!(
            reader.read_message().unwrap().descriptor().unwrap(),
            Descriptor::Scalar(Scalar::Text("two".into()))
        );
        assert_eq!(
            reader.read_message().unwrap().descriptor().unwrap(),
            Descriptor::Missing
        );
    }

    #[test]
    fn eof_reports_connection_closed() {
        let mut reader = MessageReader::new(Cursor::new(Vec::new()));
        assert!(matches!(
            reader.read_message().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn mid_message_eof_reports_truncation() {
        let mut bytes = wire(&[Descriptor::Scalar(Scalar::Int64(9))]);
        bytes.truncate(bytes.len() - 3);
        let buffered = bytes.len();
        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_message().unwrap_err(),
            FrameError::Truncated { have } if have == buffered
        ));
    }

    /// A reader that trickles one byte per call.
    struct ByteByByte {
        data: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByte {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn reassembles_byte_by_byte_input() {
        let data = wire(&[Descriptor::Scalar(Scalar::Float64(6.25))]);
        let mut reader = MessageReader::new(ByteByByte { data, pos: 0 });
        assert_eq!(
            reader.read_message().unwrap().descriptor().unwrap(),
            Descriptor::Scalar(Scalar::Float64(6.25))
        );
    }
}
