//! Neighbor links, the two TCP connections a ring member holds.
//!
//! A link is born either by dialing (we write a greeting first) or by
//! accepting (we read the dialer's greeting first). Once established, a
//! reader task feeds whole frames to the node actor. Any read error, EOF or
//! timeout ends the reader with a `Closed` event; the actor owns the write
//! half and is the only one that sends.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use ringchat_core::wire::{self, Command, Frame, ProtocolError, HEADER_LEN};
use ringchat_core::{ControlMessage, PeerAddress};

use crate::error::ConnectionError;

pub type LinkId = u64;

/// How long a closing link waits for the peer's FIN.
const LINGER: Duration = Duration::from_millis(500);

/// Which neighbor slot a link occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// What link tasks report back to the node actor.
#[derive(Debug)]
pub enum LinkEvent {
    /// A complete frame, header included, exactly as received.
    Frame { link: LinkId, raw: Bytes },
    /// The reader stopped. The link is unusable from here on.
    Closed {
        link: LinkId,
        error: ConnectionError,
    },
    /// A dialer connected and greeted us.
    Inbound {
        stream: TcpStream,
        greeting: Greeting,
    },
}

// ── Greeting ──────────────────────────────────────────────────────────────────

/// First frame on every dialed link: who is calling, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub sender_id: String,
    pub intent: ControlMessage,
}

impl Greeting {
    pub fn new(sender_id: impl Into<String>, intent: ControlMessage) -> Self {
        Self {
            sender_id: sender_id.into(),
            intent,
        }
    }

    pub fn encode(&self) -> Result<Bytes, ConnectionError> {
        Ok(wire::encode(
            Command::NewConnection,
            &self.sender_id,
            &self.intent.to_string(),
        )?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, ConnectionError> {
        let frame = Frame::decode(raw)?;
        if frame.command != Command::NewConnection {
            return Err(ProtocolError::UnexpectedGreeting(format!("{:?} frame", frame.command)).into());
        }
        let intent = ControlMessage::parse(&frame.payload)?;
        Ok(Self::new(frame.sender_id, intent))
    }
}

// ── Framed I/O ────────────────────────────────────────────────────────────────

fn read_error(e: std::io::Error) -> ConnectionError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ConnectionError::Closed
    } else {
        ConnectionError::Io(e)
    }
}

/// Read one whole frame.
///
/// `header_wait` bounds the wait for the header; `None` waits as long as the
/// neighbor stays idle. Once a header is in, the body must follow within
/// `body_wait`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    header_wait: Option<Duration>,
    body_wait: Duration,
) -> Result<Bytes, ConnectionError> {
    let mut header = [0u8; HEADER_LEN];
    match header_wait {
        Some(after) => timeout(after, reader.read_exact(&mut header))
            .await
            .map_err(|_| ConnectionError::Timeout {
                what: "frame header",
                after,
            })?
            .map_err(read_error)?,
        None => reader.read_exact(&mut header).await.map_err(read_error)?,
    };

    let total = wire::decode_header(&header)?.total_len();
    let mut raw = BytesMut::zeroed(HEADER_LEN + total);
    raw[..HEADER_LEN].copy_from_slice(&header);
    timeout(body_wait, reader.read_exact(&mut raw[HEADER_LEN..]))
        .await
        .map_err(|_| ConnectionError::Timeout {
            what: "frame body",
            after: body_wait,
        })?
        .map_err(read_error)?;

    Ok(raw.freeze())
}

async fn write_frame(
    writer: &mut (impl AsyncWrite + Unpin),
    raw: &[u8],
    after: Duration,
) -> Result<(), ConnectionError> {
    timeout(after, writer.write_all(raw))
        .await
        .map_err(|_| ConnectionError::Timeout {
            what: "frame write",
            after,
        })??;
    Ok(())
}

// ── Dial / accept ─────────────────────────────────────────────────────────────

/// Open an outbound link and introduce ourselves.
pub async fn dial(
    addr: &PeerAddress,
    connect_timeout: Duration,
    greeting: &Greeting,
) -> Result<TcpStream, ConnectionError> {
    tracing::debug!(peer = %addr, intent = %greeting.intent, "dialing neighbor");

    let mut stream = timeout(
        connect_timeout,
        TcpStream::connect((addr.host.as_str(), addr.port)),
    )
    .await
    .map_err(|_| ConnectionError::Timeout {
        what: "dial",
        after: connect_timeout,
    })?
    .map_err(|source| ConnectionError::Dial {
        addr: addr.clone(),
        source,
    })?;

    stream.set_nodelay(true)?;
    write_frame(&mut stream, &greeting.encode()?, connect_timeout).await?;
    Ok(stream)
}

/// Read the greeting off a freshly accepted connection.
pub async fn accept(
    mut stream: TcpStream,
    greeting_timeout: Duration,
) -> Result<(TcpStream, Greeting), ConnectionError> {
    let raw = read_frame(&mut stream, Some(greeting_timeout), greeting_timeout).await?;
    let greeting = Greeting::decode(&raw)?;
    stream.set_nodelay(true)?;
    Ok((stream, greeting))
}

/// Accept inbound connections for as long as the node is listening.
///
/// Each greeting is read on its own task so a silent dialer never holds up
/// the next connection. Runs until the event channel closes.
pub async fn listen_loop(
    listener: TcpListener,
    events: mpsc::UnboundedSender<LinkEvent>,
    greeting_timeout: Duration,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        if events.is_closed() {
            return;
        }

        let events = events.clone();
        tokio::spawn(async move {
            match accept(stream, greeting_timeout).await {
                Ok((stream, greeting)) => {
                    tracing::debug!(%peer, intent = %greeting.intent, "inbound link greeted");
                    let _ = events.send(LinkEvent::Inbound { stream, greeting });
                }
                Err(e) => tracing::warn!(%peer, error = %e, "dropping inbound connection"),
            }
        });
    }
}

// ── NeighborLink ──────────────────────────────────────────────────────────────

/// An established connection to an adjacent ring member.
#[derive(Debug)]
pub struct NeighborLink {
    id: LinkId,
    address: PeerAddress,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl NeighborLink {
    /// Take ownership of a greeted stream and start its reader task.
    pub fn spawn(
        id: LinkId,
        address: PeerAddress,
        stream: TcpStream,
        events: mpsc::UnboundedSender<LinkEvent>,
        body_timeout: Duration,
    ) -> Self {
        let (mut read_half, writer) = stream.into_split();
        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half, None, body_timeout).await {
                    Ok(raw) => {
                        if events.send(LinkEvent::Frame { link: id, raw }).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = events.send(LinkEvent::Closed { link: id, error });
                        return;
                    }
                }
            }
        });
        Self {
            id,
            address,
            writer,
            reader,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub async fn send(&mut self, raw: &[u8], after: Duration) -> Result<(), ConnectionError> {
        write_frame(&mut self.writer, raw, after).await
    }

    /// Send FIN. The reader keeps draining until the peer hangs up too.
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }

    /// Close both directions. Unread input is drained for up to `LINGER` so
    /// the socket is not reset under frames we already sent. Errors are
    /// ignored: the peer may be gone already.
    pub async fn close(mut self) {
        self.shutdown().await;
        if timeout(LINGER, &mut self.reader).await.is_err() {
            self.reader.abort();
        }
    }
}

impl Drop for NeighborLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
