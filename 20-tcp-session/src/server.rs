use std::{io, net::SocketAddr};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpSocket, TcpStream},
};
use tracing::{debug, info, warn};

use crate::{
    command::{Decision, GREETING, interpret},
    endpoint::{Endpoint, Received},
    framing::Framing,
};

const LISTEN_BACKLOG: u32 = 10;

/// Single-client session server. Clients are served strictly one after
/// another on the same listener; only the per-client endpoint is recycled.
pub struct Server {
    listener: TcpListener,
    framing: Framing,
}

enum SessionState {
    WaitingForClient,
    ServingClient(Endpoint<TcpStream>),
    ShuttingDown,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client left or the connection broke; wait for the next one.
    ClientLeft,
    /// The client asked the whole server to stop.
    Shutdown,
}

impl Server {
    pub fn new(listener: TcpListener, framing: Framing) -> Self {
        Self { listener, framing }
    }

    /// Binds with `SO_REUSEADDR` so a restarted server can take the port back
    /// straight away.
    pub fn bind(addr: SocketAddr, framing: Framing) -> io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;
        Ok(Self::new(listener, framing))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves clients until one of them sends the shutdown token. Per-client
    /// failures, accept errors included, are logged and never end the loop,
    /// so there is no error to return.
    pub async fn run(self) {
        let Server { listener, framing } = self;
        let mut state = SessionState::WaitingForClient;

        loop {
            state = match state {
                SessionState::WaitingForClient => accept_client(&listener, &framing).await,
                SessionState::ServingClient(endpoint) => match serve_session(endpoint).await {
                    SessionEnd::ClientLeft => SessionState::WaitingForClient,
                    SessionEnd::Shutdown => SessionState::ShuttingDown,
                },
                SessionState::ShuttingDown => break,
            };
        }

        info!("server shutting down");
    }
}

async fn accept_client(listener: &TcpListener, framing: &Framing) -> SessionState {
    match Endpoint::accept(listener, framing).await {
        Ok(endpoint) => {
            info!(peer = %endpoint.peer(), "client connected");
            greet(endpoint).await
        }
        Err(err) => {
            warn!(error = ?err, "failed to accept connection");
            SessionState::WaitingForClient
        }
    }
}

async fn greet(mut endpoint: Endpoint<TcpStream>) -> SessionState {
    match endpoint.send(GREETING.as_bytes()).await {
        Ok(()) => {
            debug!(peer = %endpoint.peer(), "sent greeting");
            SessionState::ServingClient(endpoint)
        }
        Err(err) => {
            warn!(peer = %endpoint.peer(), error = ?err, "failed to greet client");
            SessionState::WaitingForClient
        }
    }
}

/// Runs one client session to completion. The endpoint is closed on every
/// exit path.
pub async fn serve_session<S>(mut endpoint: Endpoint<S>) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let peer = endpoint.peer();

    loop {
        let frame = match endpoint.receive().await {
            Ok(Received::Frame(frame)) => frame,
            Ok(Received::EndOfStream) => {
                info!(%peer, "client closed the connection");
                return SessionEnd::ClientLeft;
            }
            Err(err) => {
                warn!(%peer, error = ?err, "connection to client lost");
                endpoint.close().await;
                return SessionEnd::ClientLeft;
            }
        };

        let text = frame.text();
        match interpret(&text) {
            Decision::Continue { reply } => {
                info!(%peer, message = %text, "client says");
                if let Err(err) = endpoint.send(reply.as_bytes()).await {
                    warn!(%peer, error = ?err, "connection to client lost");
                    return SessionEnd::ClientLeft;
                }
            }
            Decision::ClientDisconnect => {
                endpoint.close().await;
                info!(%peer, "client disconnected");
                return SessionEnd::ClientLeft;
            }
            Decision::ServerShutdown => {
                endpoint.close().await;
                info!(%peer, "client disconnected and requested shutdown");
                return SessionEnd::Shutdown;
            }
        }
    }
}
