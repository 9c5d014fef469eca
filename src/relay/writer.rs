//! Console to session direction

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::command::{self, Command};
use super::console::{Console, InputLine};
use super::error::RelayError;
use super::session::{Frame, SessionWriter};
use super::shutdown::ShutdownSignal;

/// Writer loop settings
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// Largest file accepted by `send_file`
    pub max_frame_bytes: usize,
    /// Close the session once console input ends
    pub close_on_eof: bool,
}

/// Why the writer loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// Console input ended
    InputClosed,
    /// Shutdown was triggered
    Cancelled,
    /// The session was closed underneath the writer
    SessionClosed,
}

/// Forward console lines until input ends, shutdown is triggered, or a
/// fatal error occurs. Recoverable errors are reported to the console and
/// the loop continues with the next line.
pub async fn run(
    mut lines: mpsc::UnboundedReceiver<InputLine>,
    session: SessionWriter,
    console: Console,
    mut shutdown: ShutdownSignal,
    options: WriterOptions,
) -> Result<WriterExit, RelayError> {
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                debug!("Writer stopping on shutdown");
                return Ok(WriterExit::Cancelled);
            }
            line = lines.recv() => line,
        };

        let Some(line) = line else {
            info!("Console input closed");
            if options.close_on_eof {
                session.close().await?;
            }
            return Ok(WriterExit::InputClosed);
        };

        let handled = match line {
            Ok(line) => handle_line(&line, &session, &console, options.max_frame_bytes).await,
            Err(e) => Err(e),
        };

        match handled {
            Ok(()) => {}
            Err(RelayError::SessionClosed) => {
                debug!("Session closed while sending");
                return Ok(WriterExit::SessionClosed);
            }
            Err(e) if e.is_recoverable() => {
                warn!("{}", e);
                console.report(&e)?;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn handle_line(
    line: &str,
    session: &SessionWriter,
    console: &Console,
    max_frame_bytes: usize,
) -> Result<(), RelayError> {
    match command::parse(line)? {
        Command::Text(text) => {
            session.send(Frame::Text(text)).await?;
            console.sent(line)?;
        }
        Command::SendFile(path) => {
            let payload = read_file(&path, max_frame_bytes).await?;
            let size = payload.len();
            session.send(Frame::Binary(payload)).await?;
            debug!("Sent {} ({} bytes)", path.display(), size);
            console.sent_file(&path)?;
        }
    }
    Ok(())
}

/// Read a whole file for a binary frame.
///
/// Reads until end of file or the size reported by the filesystem, whichever
/// comes first. Fewer bytes than reported is an error, never a partial frame.
pub async fn read_file(path: &Path, limit: usize) -> Result<Vec<u8>, RelayError> {
    let file_error = |source| RelayError::File {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(file_error)?;
    let metadata = file.metadata().await.map_err(file_error)?;
    if metadata.is_dir() {
        return Err(file_error(std::io::ErrorKind::IsADirectory.into()));
    }

    let size = metadata.len();

    if size > limit as u64 {
        return Err(RelayError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }

    let mut payload = Vec::with_capacity(size as usize);
    file.take(size)
        .read_to_end(&mut payload)
        .await
        .map_err(file_error)?;

    if (payload.len() as u64) < size {
        return Err(RelayError::ShortRead {
            path: path.to_path_buf(),
            expected: size,
            actual: payload.len() as u64,
        });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_file_contents() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"binary\x00payload").unwrap();

        let payload = read_file(file.path(), 1024).await.unwrap();
        assert_eq!(payload, b"binary\x00payload");
    }

    #[tokio::test]
    async fn test_read_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let payload = read_file(file.path(), 1024).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_file(Path::new("/definitely/not/here.bin"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::File { .. }));
        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("/definitely/not/here.bin: "));
    }

    #[tokio::test]
    async fn test_read_file_over_limit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 64]).unwrap();

        let err = read_file(file.path(), 63).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::FileTooLarge {
                size: 64,
                limit: 63,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_read_directory_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(dir.path(), usize::MAX).await.unwrap_err();
        assert!(matches!(err, RelayError::File { .. }));
    }
}
