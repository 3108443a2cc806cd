/// Errors that can occur while establishing or using a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host string could not be resolved to any address.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// Resolution succeeded but produced no addresses.
    #[error("no addresses found for {host}")]
    NoAddresses { host: String },

    /// Failed to connect to the specified host.
    #[error("failed to connect to {host}: {source}")]
    Connect {
        host: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
