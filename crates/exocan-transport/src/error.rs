use std::net::SocketAddr;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the requested device.
    #[error("failed to open {channel}: {message}")]
    Open { channel: String, message: String },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The channel string could not be interpreted.
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// The channel kind is not available in this build.
    #[error("unsupported channel: {0}")]
    Unsupported(String),

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been closed (EOF, device gone, or local shutdown).
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub(crate) fn connect(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            addr: addr.into(),
            source,
        }
    }

    pub(crate) fn connect_addr(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::connect(addr.to_string(), source)
    }

    /// True when the error means the link will not produce more data.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
