use mdsip_codec::CodecError;
use mdsip_frame::FrameError;
use mdsip_transport::TransportError;

/// Errors surfaced by a [`Connection`](crate::Connection).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Message framing or transfer failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A descriptor buffer could not be packed or unpacked.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Establishing the connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server reported a failure status for the request.
    #[error("server returned error status {status:#010x}")]
    ServerStatus { status: i32 },

    /// The server reply did not have the expected form.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(&'static str),

    /// A call may carry at most 254 arguments after the expression.
    #[error("too many call arguments ({0})")]
    TooManyArguments(usize),
}

pub type Result<T> = std::result::Result<T, ClientError>;
