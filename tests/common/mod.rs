//! Loopback WebSocket peer for relay tests

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, accept_hdr_async};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use wsrelay::relay::{
    Console, InputLine, Relay, RelayError, RelayOutcome, RelaySettings, SharedBuffer,
    ShutdownController,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// The remote end of one session. Every message it receives is queued for
/// the test; messages pushed with [`Peer::send`] go to the relay.
pub struct Peer {
    pub url: String,
    headers: Option<oneshot::Receiver<HeaderMap>>,
    incoming: mpsc::UnboundedReceiver<Message>,
    outgoing: mpsc::UnboundedSender<Message>,
}

pub async fn spawn_peer() -> Peer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (headers_tx, headers_rx) = oneshot::channel();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = headers_tx.send(request.headers().clone());
            Ok(response)
        };
        let ws = accept_hdr_async(stream, callback).await.unwrap();
        let (mut sink, mut stream) = ws.split();

        let mut outgoing_open = true;
        loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(message)) => {
                        let is_close = message.is_close();
                        let _ = incoming_tx.send(message);
                        if is_close {
                            // Push out the close reply queued by the read.
                            let _ = sink.flush().await;
                        }
                    }
                    _ => break,
                },
                outgoing = outgoing_rx.recv(), if outgoing_open => match outgoing {
                    Some(message) => {
                        if sink.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => outgoing_open = false,
                },
            }
        }
    });

    Peer {
        url: format!("ws://{}/ws", addr),
        headers: Some(headers_rx),
        incoming: incoming_rx,
        outgoing: outgoing_tx,
    }
}

/// A peer that completes the handshake and then never reads, so the
/// relay's sends back up once the socket buffers fill.
pub async fn spawn_stalled_peer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ws = accept_async(stream).await.unwrap();
        std::future::pending::<()>().await;
    });

    format!("ws://{}/ws", addr)
}

impl Peer {
    /// Next message from the relay; panics if none arrives in time
    pub async fn next_message(&mut self) -> Message {
        timeout(WAIT, self.incoming.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("peer connection ended")
    }

    /// Headers of the upgrade request
    pub async fn headers(&mut self) -> HeaderMap {
        let headers = self.headers.take().expect("headers already taken");
        timeout(WAIT, headers)
            .await
            .expect("timed out waiting for the handshake")
            .expect("handshake never completed")
    }

    pub fn send(&self, message: Message) {
        self.outgoing.send(message).unwrap();
    }
}

/// A relay running on its own task
pub struct RunningRelay {
    pub lines: mpsc::UnboundedSender<InputLine>,
    pub controller: ShutdownController,
    pub output: SharedBuffer,
    pub handle: JoinHandle<Result<RelayOutcome, RelayError>>,
}

pub async fn start_relay(settings: RelaySettings) -> RunningRelay {
    let (console, output) = Console::buffer();
    let relay = Relay::connect(&settings, console).await.unwrap();
    let controller = relay.shutdown_controller();
    let (lines, input) = mpsc::unbounded_channel();
    let handle = tokio::spawn(relay.run(input));

    RunningRelay {
        lines,
        controller,
        output,
        handle,
    }
}

impl RunningRelay {
    pub fn type_line(&self, line: impl Into<String>) {
        self.lines.send(Ok(line.into())).unwrap();
    }

    /// Wait until the console output contains `needle`
    pub async fn wait_for_output(&self, needle: &[u8]) {
        wait_for_output(&self.output, needle).await;
    }

    pub async fn finish(self) -> Result<RelayOutcome, RelayError> {
        timeout(WAIT, self.handle)
            .await
            .expect("relay did not stop in time")
            .expect("relay task panicked")
    }
}

pub async fn wait_for_output(output: &SharedBuffer, needle: &[u8]) {
    let found = timeout(WAIT, async {
        loop {
            if contains_bytes(&output.contents(), needle) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(
        found.is_ok(),
        "console never showed {:?}, got {:?}",
        String::from_utf8_lossy(needle),
        output.contents_lossy()
    );
}

pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Deterministic non-text payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
