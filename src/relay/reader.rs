//! Session to console direction

use tracing::debug;

use super::console::Console;
use super::error::RelayError;
use super::session::SessionReader;
use super::shutdown::ShutdownSignal;

/// Why the reader loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Shutdown was triggered
    Cancelled,
    /// A close we started has completed
    Closed,
}

/// Print every received frame as `<< <payload>` until shutdown, a finished
/// close, or a receive error. A close started by the peer is an error.
pub async fn run(
    mut session: SessionReader,
    console: Console,
    mut shutdown: ShutdownSignal,
) -> Result<ReaderExit, RelayError> {
    let mut frames = 0u64;
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                debug!("Reader stopping on shutdown after {} frames", frames);
                return Ok(ReaderExit::Cancelled);
            }
            frame = session.receive() => frame?,
        };

        let Some(frame) = frame else {
            debug!("Reader finished after {} frames", frames);
            return Ok(ReaderExit::Closed);
        };

        frames += 1;
        debug!("Received {:?} frame of {} bytes", frame.kind(), frame.len());
        console.received(frame.payload())?;
    }
}
