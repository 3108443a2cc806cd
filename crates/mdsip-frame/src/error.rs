use mdsip_codec::CodecError;

/// Errors that can occur while encoding, decoding or transferring
/// messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message length exceeds the configured maximum.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The message header or body is structurally inconsistent.
    #[error("malformed message: {0}")]
    Malformed(&'static str),

    /// Only missing, scalar and array values have a data-only wire form.
    #[error("composite values cannot be framed directly; serialize them first")]
    CompositeValue,

    /// The compressed body could not be inflated.
    #[error("compressed message body is invalid: {0}")]
    Compression(std::io::Error),

    /// The body bytes did not decode as the declared value.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An I/O error occurred while reading or writing messages.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended part way through a message.
    #[error("stream ended mid-message ({have} bytes buffered)")]
    Truncated { have: usize },

    /// The connection was closed on a message boundary.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
