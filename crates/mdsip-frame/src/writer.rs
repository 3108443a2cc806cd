use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> MessageWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one message (blocking).
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        self.buf.clear();
        message.encode(&mut self.buf);
        trace!(
            msglen = message.header.msglen,
            message_id = message.header.message_id,
            "sending message"
        );

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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
}

#[cfg(test)]
mod tests {
    use mdsip_codec::{Descriptor, Scalar};

    use super::*;
    use crate::message::DEFAULT_MAX_MESSAGE;

    #[test]
    fn written_bytes_decode_back() {
        let mut writer = MessageWriter::new(Vec::new());
        let message =
            Message::from_descriptor(&Descriptor::Scalar(Scalar::Int32(3)), 0).unwrap();
        writer.write_message(&message).unwrap();

        let mut buf = BytesMut::from(writer.into_inner().as_slice());
        let decoded = Message::decode(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(
            decoded.descriptor().unwrap(),
            Descriptor::Scalar(Scalar::Int32(3))
        );
    }

    /// A writer that accepts one byte per call.
    struct OneByteSink(Vec<u8>);

    impl Write for OneByteSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.0.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn handles_short_writes() {
        let mut writer = MessageWriter::new(OneByteSink(Vec::new()));
        let message =
            Message::from_descriptor(&Descriptor::Scalar(Scalar::Text("abc".into())), 0)
                .unwrap();
        writer.write_message(&message).unwrap();
        assert_eq!(writer.get_ref().0.len(), 48 + 3);
    }
}
