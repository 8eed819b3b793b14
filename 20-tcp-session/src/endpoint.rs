use std::{io, net::SocketAddr};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream, lookup_host},
};
use tracing::debug;

use crate::{
    error::SessionError,
    framing::{Frame, Framer, Framing},
};

/// Result of a successful receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Frame(Frame),
    /// The peer closed its side cleanly. Not an error.
    EndOfStream,
}

/// One live connection to a single peer, plus the framing state for it.
///
/// The stream is dropped as soon as the endpoint closes, so a closed endpoint
/// can never be written to by accident.
pub struct Endpoint<S = TcpStream> {
    stream: Option<S>,
    peer: SocketAddr,
    framer: Framer,
}

impl Endpoint<TcpStream> {
    /// Resolves `host` and connects to the first address that accepts.
    pub async fn connect(host: &str, port: u16, framing: &Framing) -> Result<Self, SessionError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|source| SessionError::Resolve {
                host: host.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(SessionError::Resolve {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(Self::new(stream, addr, framing)),
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_error = Some(err);
                }
            }
        }

        Err(SessionError::Connect {
            host: format!("{host}:{port}"),
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address tried")),
        })
    }

    /// Waits for the next client on `listener`.
    pub async fn accept(listener: &TcpListener, framing: &Framing) -> Result<Self, SessionError> {
        let (stream, peer) = listener.accept().await.map_err(SessionError::Accept)?;
        Ok(Self::new(stream, peer, framing))
    }
}

impl<S> Endpoint<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, framing: &Framing) -> Self {
        Self {
            stream: Some(stream),
            peer,
            framer: Framer::new(framing),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Frames and writes `payload`. A failed write closes the endpoint before
    /// the error is returned.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        let peer = self.peer;
        let Some(stream) = self.stream.as_mut() else {
            return Err(SessionError::Send {
                peer,
                source: not_connected(),
            });
        };

        let encoded = self.framer.encode(payload);
        let written = write_frame(stream, &encoded).await;
        if let Err(source) = written {
            self.close().await;
            return Err(SessionError::Send { peer, source });
        }

        Ok(())
    }

    pub async fn receive(&mut self) -> Result<Received, SessionError> {
        let peer = self.peer;
        let Some(stream) = self.stream.as_mut() else {
            return Err(SessionError::Receive {
                peer,
                source: not_connected(),
            });
        };

        let decoded = self.framer.decode(stream).await;
        match decoded {
            Ok(Some(frame)) => Ok(Received::Frame(frame)),
            Ok(None) => {
                self.close().await;
                Ok(Received::EndOfStream)
            }
            Err(source) => Err(SessionError::Receive { peer, source }),
        }
    }

    /// Shuts down the write side and releases the stream. Safe to call twice.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.shutdown().await {
                debug!(peer = %self.peer, error = %err, "shutdown failed while closing");
            }
        }
    }
}

async fn write_frame<W>(writer: &mut W, encoded: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(encoded).await?;
    writer.flush().await
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "endpoint is closed")
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use super::*;

    fn pair(framing: &Framing) -> (Endpoint<DuplexStream>, Endpoint<DuplexStream>) {
        let (left, right) = tokio::io::duplex(1024);
        let addr: SocketAddr = "127.0.0.1:5000".parse().expect("addr");
        (
            Endpoint::new(left, addr, framing),
            Endpoint::new(right, addr, framing),
        )
    }

    #[tokio::test]
    async fn frames_cross_between_endpoints() {
        let (mut client, mut server) = pair(&Framing::newline());

        client.send(b"hello").await.expect("send");
        let received = server.receive().await.expect("receive");

        assert_eq!(received, Received::Frame(Frame::new(&b"hello"[..])));
    }

    #[tokio::test]
    async fn peer_close_is_end_of_stream_and_closes_endpoint() {
        let (mut client, mut server) = pair(&Framing::newline());

        client.close().await;
        assert!(!client.is_open());

        let received = server.receive().await.expect("receive");
        assert_eq!(received, Received::EndOfStream);
        assert!(!server.is_open());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_io() {
        let (mut client, _server) = pair(&Framing::fixed(8).expect("chunk size"));

        client.close().await;
        client.close().await;

        let err = client.send(b"late").await.expect_err("closed endpoint");
        assert!(matches!(err, SessionError::Send { .. }));
        assert_eq!(err.io_error().kind(), io::ErrorKind::NotConnected);

        let err = client.receive().await.expect_err("closed endpoint");
        assert!(matches!(err, SessionError::Receive { .. }));
    }

    #[tokio::test]
    async fn failed_send_closes_endpoint() {
        let (mut client, server) = pair(&Framing::newline());
        drop(server);

        let err = client.send(b"anyone there").await.expect_err("peer gone");
        assert!(matches!(err, SessionError::Send { .. }));
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn connect_reports_unreachable_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let result = Endpoint::connect("127.0.0.1", port, &Framing::newline()).await;
        assert!(matches!(result, Err(SessionError::Connect { .. })));
    }

    #[tokio::test]
    async fn accept_records_peer_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let endpoint = Endpoint::accept(&listener, &Framing::newline())
            .await
            .expect("accept");
        let stream = client.await.expect("join").expect("connect");

        assert_eq!(endpoint.peer(), stream.local_addr().expect("local addr"));
        assert!(endpoint.is_open());
    }
}
