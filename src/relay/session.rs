//! WebSocket session shared by the writer, reader and shutdown paths

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Uri, header::ORIGIN};
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config, tungstenite};
use tracing::{debug, info, warn};

use super::error::RelayError;
use super::headers::HeaderSet;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Kind of a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// One data frame sent or received atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Text(_) => FrameKind::Text,
            Frame::Binary(_) => FrameKind::Binary,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.payload().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        }
    }
}

/// Validate an origin before it is placed in the upgrade request
pub fn parse_origin(origin: &str) -> Result<HeaderValue, RelayError> {
    origin
        .parse::<Uri>()
        .map_err(|e| RelayError::InvalidOrigin {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;

    HeaderValue::from_str(origin).map_err(|e| RelayError::InvalidOrigin {
        origin: origin.to_string(),
        reason: e.to_string(),
    })
}

/// An established WebSocket session
pub struct Session {
    stream: WsStream,
}

impl Session {
    /// Dial `target` and complete the upgrade handshake
    pub async fn connect(
        target: &str,
        headers: &HeaderSet,
        origin: Option<&str>,
        max_frame_bytes: usize,
    ) -> Result<Self, RelayError> {
        let dial_error = |source| RelayError::Dial {
            target: target.to_string(),
            source,
        };

        let mut request = target.into_client_request().map_err(dial_error)?;
        headers.apply(request.headers_mut())?;
        if let Some(origin) = origin {
            request.headers_mut().insert(ORIGIN, parse_origin(origin)?);
        }

        let config = WebSocketConfig {
            max_message_size: Some(max_frame_bytes),
            max_frame_size: Some(max_frame_bytes),
            ..Default::default()
        };

        let (stream, response) = connect_async_with_config(request, Some(config), false)
            .await
            .map_err(dial_error)?;

        info!("Connected to {} (status {})", target, response.status());
        Ok(Self { stream })
    }

    /// Split into the send half (shared by the writer and the shutdown
    /// controller) and the receive half (owned by the reader).
    pub fn split(self) -> (SessionWriter, SessionReader) {
        let (sink, stream) = self.stream.split();
        let closed = Arc::new(AtomicBool::new(false));

        let writer = SessionWriter {
            sink: Arc::new(Mutex::new(Some(sink))),
            closed: closed.clone(),
        };
        let reader = SessionReader { stream, closed };

        (writer, reader)
    }
}

/// Send half of a session.
///
/// Sends and closes are serialised by one lock, so a close issued while a
/// send is in flight waits for that send. Any send after the close returns
/// [`RelayError::SessionClosed`].
#[derive(Clone)]
pub struct SessionWriter {
    sink: Arc<Mutex<Option<SplitSink<WsStream, Message>>>>,
    closed: Arc<AtomicBool>,
}

impl SessionWriter {
    pub async fn send(&self, frame: Frame) -> Result<(), RelayError> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink.send(frame.into()).await.map_err(RelayError::from_send),
            None => Err(RelayError::SessionClosed),
        }
    }

    /// Start the close handshake. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), RelayError> {
        let mut guard = self.sink.lock().await;
        let Some(mut sink) = guard.take() else {
            debug!("Session already closed");
            return Ok(());
        };

        self.closed.store(true, Ordering::SeqCst);
        match sink.close().await {
            Ok(()) => {
                info!("Session closed");
                Ok(())
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                debug!("Session was already closed by the peer");
                Ok(())
            }
            Err(e) => {
                warn!("Error closing session: {}", e);
                Err(RelayError::Transport(e))
            }
        }
    }

    /// Close, giving up after `grace`.
    ///
    /// A peer that stopped reading leaves the close waiting on a send in
    /// flight or on flushing a partly written frame. Past `grace` the sink is
    /// dropped unflushed and the socket goes away with the session.
    pub async fn close_within(&self, grace: Duration) -> Result<(), RelayError> {
        match tokio::time::timeout(grace, self.close()).await {
            Ok(result) => result,
            Err(_) => {
                self.closed.store(true, Ordering::SeqCst);
                Err(RelayError::CloseTimeout(grace))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Receive half of a session
pub struct SessionReader {
    stream: SplitStream<WsStream>,
    closed: Arc<AtomicBool>,
}

impl SessionReader {
    /// Wait for the next data frame. Control frames are skipped.
    ///
    /// Text frames must be valid UTF-8: tungstenite validates them while
    /// reading, so a peer sending malformed text ends the session with
    /// [`RelayError::Transport`]. Binary frames are passed through untouched.
    ///
    /// Returns `Ok(None)` once a close that we started has completed; a close
    /// started by the peer is [`RelayError::PeerClosed`].
    pub async fn receive(&mut self) -> Result<Option<Frame>, RelayError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => return self.closed_with("EOF".to_string()),
                Some(Err(e)) => return Err(RelayError::Transport(e)),
            };

            match message {
                Message::Text(text) => return Ok(Some(Frame::Text(text))),
                Message::Binary(bytes) => return Ok(Some(Frame::Binary(bytes))),
                Message::Close(frame) => {
                    let reason = match frame {
                        Some(frame) if frame.reason.is_empty() => u16::from(frame.code).to_string(),
                        Some(frame) => format!("{} {}", u16::from(frame.code), frame.reason),
                        None => "no close frame".to_string(),
                    };
                    return self.closed_with(reason);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    debug!("Skipping control frame");
                }
            }
        }
    }

    fn closed_with(&self, reason: String) -> Result<Option<Frame>, RelayError> {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Close handshake finished ({})", reason);
            Ok(None)
        } else {
            Err(RelayError::PeerClosed { reason })
        }
    }
}
