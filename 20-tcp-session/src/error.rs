use std::{io, net::SocketAddr};

/// Failures of a single connection. None of these are fatal to the process;
/// callers log them and move on to the next state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to resolve {host}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {host}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept a client")]
    Accept(#[source] io::Error),
    #[error("failed to send to {peer}")]
    Send {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to receive from {peer}")]
    Receive {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub fn io_error(&self) -> &io::Error {
        match self {
            SessionError::Resolve { source, .. }
            | SessionError::Connect { source, .. }
            | SessionError::Send { source, .. }
            | SessionError::Receive { source, .. }
            | SessionError::Accept(source) => source,
        }
    }
}
