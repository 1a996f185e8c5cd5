use std::net::SocketAddr;

/// Errors that can occur in bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] exocan_transport::TransportError),

    /// Frame-level error (invalid identifier, oversized payload).
    #[error("frame error: {0}")]
    Frame(#[from] exocan_frame::FrameError),

    /// The synchronizer thread could not be started.
    #[error("failed to spawn synchronizer thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The diagnostic mirror socket could not be set up.
    #[error("failed to set up diagnostic mirror to {addr}: {source}")]
    Mirror {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The bus has been shut down.
    #[error("bus is shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, BusError>;
