//! Operator console: prefixed output lines and a line-based input feed

use std::fmt::Display;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::RelayError;

/// Prefix for lines the operator sent
pub const SENT_PREFIX: &str = ">>";
/// Prefix for frames received from the peer
pub const RECEIVED_PREFIX: &str = "<<";

/// Shared output stream. Each call writes one whole line under the lock so
/// echoes and received frames interleave only at line boundaries.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    colors: bool,
}

impl Console {
    /// Console on stdout; colours are used only on a terminal
    pub fn stdout(enable_colors: bool) -> Self {
        let colors = enable_colors && io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), colors)
    }

    pub fn new(out: Box<dyn Write + Send>, colors: bool) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            colors,
        }
    }

    /// Console writing into memory, returned together with the buffer
    pub fn buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::new(Box::new(buffer.clone()), false), buffer)
    }

    /// `>> <text>`
    pub fn sent(&self, text: &str) -> io::Result<()> {
        let prefix = self.paint(SENT_PREFIX, Prefix::Sent);
        self.write_line(&[prefix.as_bytes(), b" ".as_slice(), text.as_bytes()])
    }

    /// `>> file <path> sent`
    pub fn sent_file(&self, path: &Path) -> io::Result<()> {
        let prefix = self.paint(SENT_PREFIX, Prefix::Sent);
        let message = format!("file {} sent", path.display());
        self.write_line(&[prefix.as_bytes(), b" ".as_slice(), message.as_bytes()])
    }

    /// `>> <error>`
    pub fn report(&self, error: &dyn Display) -> io::Result<()> {
        let prefix = self.paint(SENT_PREFIX, Prefix::Error);
        let message = error.to_string();
        self.write_line(&[prefix.as_bytes(), b" ".as_slice(), message.as_bytes()])
    }

    /// `<< <payload>`, exactly the bytes received
    pub fn received(&self, payload: &[u8]) -> io::Result<()> {
        let prefix = self.paint(RECEIVED_PREFIX, Prefix::Received);
        self.write_line(&[prefix.as_bytes(), b" ".as_slice(), payload])
    }

    pub fn exiting(&self) -> io::Result<()> {
        self.write_line(&[b"\nexiting".as_slice()])
    }

    fn paint(&self, prefix: &str, kind: Prefix) -> String {
        if !self.colors {
            return prefix.to_string();
        }
        match kind {
            Prefix::Sent => prefix.green().to_string(),
            Prefix::Received => prefix.cyan().to_string(),
            Prefix::Error => prefix.red().bold().to_string(),
        }
    }

    fn write_line(&self, parts: &[&[u8]]) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        for part in parts {
            out.write_all(part)?;
        }
        out.write_all(b"\n")?;
        out.flush()
    }
}

enum Prefix {
    Sent,
    Received,
    Error,
}

/// In-memory console sink
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One line of operator input. A line that is not valid UTF-8 arrives as
/// [`RelayError::InvalidInput`] so the writer can report it and carry on.
pub type InputLine = Result<String, RelayError>;

/// Operator input as a stream of lines
pub struct ConsoleInput;

impl ConsoleInput {
    /// Read stdin on a dedicated thread. Blocking stdin reads would otherwise
    /// hold up runtime shutdown. The channel closes at end of input.
    pub fn spawn_stdin() -> io::Result<mpsc::UnboundedReceiver<InputLine>> {
        Self::spawn_reader(io::BufReader::new(io::stdin()))
    }

    pub fn spawn_reader<R>(mut reader: R) -> io::Result<mpsc::UnboundedReceiver<InputLine>>
    where
        R: BufRead + Send + 'static,
    {
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = String::from_utf8(strip_line_ending(&buf).to_vec())
                                .map_err(RelayError::from);
                            if line_tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("Failed to read console input: {}", e);
                            break;
                        }
                    }
                }
                debug!("Console input finished");
            })?;

        Ok(line_rx)
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => line,
    }
}
