use std::{io, num::NonZeroUsize};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const DEFAULT_CHUNK_SIZE: usize = 128;
pub const DEFAULT_TERMINATOR: &[u8] = b"\n";

/// Longest delimited frame accepted before the terminator shows up.
pub const MAX_DELIMITED_FRAME: usize = 64 * 1024;

/// How a byte stream is cut into messages. Chosen once at startup and shared
/// by every endpoint the process creates.
///
/// Built through [`Framing::fixed`], [`Framing::delimited`] or
/// [`Framing::newline`]; a zero chunk size or an empty terminator cannot be
/// represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    /// Whatever a single read returns, up to `size` bytes, is one message.
    FixedChunk { size: NonZeroUsize },
    /// Messages end with `terminator`, which is appended on send and stripped
    /// on receive.
    Delimited { terminator: Terminator },
}

/// Non-empty byte sequence that ends a delimited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminator(Vec<u8>);

impl Terminator {
    pub fn new(bytes: impl Into<Vec<u8>>) -> io::Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "terminator must not be empty",
            ));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Framing {
    pub fn fixed(size: usize) -> io::Result<Self> {
        let size = NonZeroUsize::new(size).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be greater than zero",
            )
        })?;
        Ok(Framing::FixedChunk { size })
    }

    pub fn delimited(terminator: impl Into<Vec<u8>>) -> io::Result<Self> {
        Ok(Framing::Delimited {
            terminator: Terminator::new(terminator)?,
        })
    }

    pub fn newline() -> Self {
        Framing::Delimited {
            terminator: Terminator(DEFAULT_TERMINATOR.to_vec()),
        }
    }
}

impl Default for Framing {
    fn default() -> Self {
        Framing::newline()
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text. Invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Per-connection framing state. Each endpoint owns one, so buffered bytes
/// never outlive the connection they came from.
#[derive(Debug)]
pub enum Framer {
    FixedChunk {
        chunk: Box<[u8]>,
    },
    Delimited {
        terminator: Vec<u8>,
        pending: BytesMut,
        /// Prefix of `pending` already known to hold no terminator.
        searched: usize,
    },
}

impl Framer {
    pub fn new(framing: &Framing) -> Self {
        match framing {
            Framing::FixedChunk { size } => Framer::FixedChunk {
                chunk: vec![0; size.get()].into_boxed_slice(),
            },
            Framing::Delimited { terminator } => Framer::Delimited {
                terminator: terminator.as_bytes().to_vec(),
                pending: BytesMut::with_capacity(1024),
                searched: 0,
            },
        }
    }

    /// Bytes to put on the wire for `payload`.
    pub fn encode(&self, payload: &[u8]) -> Bytes {
        match self {
            Framer::FixedChunk { .. } => Bytes::copy_from_slice(payload),
            Framer::Delimited { terminator, .. } => {
                let mut encoded = BytesMut::with_capacity(payload.len() + terminator.len());
                encoded.put_slice(payload);
                encoded.put_slice(terminator);
                encoded.freeze()
            }
        }
    }

    /// Reads the next frame. `Ok(None)` means the peer closed the stream; a
    /// partial frame left behind at that point is dropped.
    pub async fn decode<R>(&mut self, reader: &mut R) -> io::Result<Option<Frame>>
    where
        R: AsyncRead + Unpin,
    {
        match self {
            Framer::FixedChunk { chunk } => {
                let len = reader.read(chunk).await?;
                if len == 0 {
                    return Ok(None);
                }
                let frame = Frame::new(Bytes::copy_from_slice(&chunk[..len]));
                chunk.fill(0);
                Ok(Some(frame))
            }
            Framer::Delimited {
                terminator,
                pending,
                searched,
            } => loop {
                // A terminator may straddle the previous scan boundary.
                let start = searched.saturating_sub(terminator.len() - 1);
                if let Some(offset) = find_terminator(&pending[start..], terminator) {
                    let pos = start + offset;
                    let mut frame = pending.split_to(pos + terminator.len());
                    frame.truncate(pos);
                    *searched = 0;
                    return Ok(Some(Frame::new(frame.freeze())));
                }
                *searched = pending.len();

                if pending.len() > MAX_DELIMITED_FRAME {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame exceeds {MAX_DELIMITED_FRAME} bytes without a terminator"),
                    ));
                }

                if reader.read_buf(pending).await? == 0 {
                    pending.clear();
                    *searched = 0;
                    return Ok(None);
                }
            },
        }
    }
}

fn find_terminator(haystack: &[u8], terminator: &[u8]) -> Option<usize> {
    haystack
        .windows(terminator.len())
        .position(|window| window == terminator)
}
