//! Duplex relay between the operator console and one WebSocket session
//!
//! The reader loop runs on the caller's task, the writer loop on a spawned
//! task, and the shutdown controller on its own task. All three share the
//! session: only the writer sends, only the reader receives, and the
//! controller closes it once.

pub mod command;
pub mod console;
pub mod error;
pub mod headers;
pub mod reader;
pub mod session;
pub mod shutdown;
pub mod writer;

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::Config;

pub use command::{Command, CommandError};
pub use console::{Console, ConsoleInput, InputLine, SharedBuffer};
pub use error::RelayError;
pub use headers::HeaderSet;
pub use reader::ReaderExit;
pub use session::{Frame, FrameKind, Session, SessionReader, SessionWriter};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use writer::{WriterExit, WriterOptions};

/// Everything needed to dial and run a relay
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub target: String,
    pub headers: HeaderSet,
    pub origin: Option<String>,
    pub max_frame_bytes: usize,
    pub close_on_eof: bool,
    pub close_timeout: Duration,
}

impl RelaySettings {
    pub fn new(target: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            target: target.into(),
            headers: HeaderSet::new(),
            origin: None,
            max_frame_bytes: defaults.session.max_frame_bytes,
            close_on_eof: defaults.session.close_on_eof,
            close_timeout: defaults.close_timeout(),
        }
    }

    /// Combine command line flags with the configuration file
    pub fn from_cli(cli: &Cli, config: &Config) -> Result<Self, RelayError> {
        let headers = HeaderSet::parse_all(cli.headers.as_slice())?;

        let origin = cli.origin.clone().filter(|origin| !origin.is_empty());
        if let Some(origin) = &origin {
            session::parse_origin(origin)?;
        }

        Ok(Self {
            target: cli.url.clone(),
            headers,
            origin,
            max_frame_bytes: config.session.max_frame_bytes,
            close_on_eof: cli.close_on_eof || config.session.close_on_eof,
            close_timeout: config.close_timeout(),
        })
    }
}

/// How a relay ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Shutdown was triggered, normally by Ctrl+C
    Interrupted,
    /// A close we started has completed
    Closed,
}

/// A connected relay, ready to run
pub struct Relay {
    writer: SessionWriter,
    reader: SessionReader,
    console: Console,
    controller: ShutdownController,
    options: WriterOptions,
}

impl Relay {
    /// Dial the peer described by `settings`
    pub async fn connect(settings: &RelaySettings, console: Console) -> Result<Self, RelayError> {
        info!("connecting to {}...", settings.target);
        let session = Session::connect(
            &settings.target,
            &settings.headers,
            settings.origin.as_deref(),
            settings.max_frame_bytes,
        )
        .await?;
        info!("ready, exit with CTRL+C.");

        Ok(Self::from_session(session, console, settings))
    }

    pub fn from_session(session: Session, console: Console, settings: &RelaySettings) -> Self {
        let (writer, reader) = session.split();
        let controller = ShutdownController::new(writer.clone(), console.clone(), settings.close_timeout);

        Self {
            writer,
            reader,
            console,
            controller,
            options: WriterOptions {
                max_frame_bytes: settings.max_frame_bytes,
                close_on_eof: settings.close_on_eof,
            },
        }
    }

    pub fn shutdown_controller(&self) -> ShutdownController {
        self.controller.clone()
    }

    /// Run both directions until shutdown, a finished close, or a fatal error.
    ///
    /// Recoverable errors stay inside the writer loop. Everything that
    /// reaches this function ends the relay.
    pub async fn run(self, input: mpsc::UnboundedReceiver<InputLine>) -> Result<RelayOutcome, RelayError> {
        let Relay {
            writer: session_writer,
            reader: session_reader,
            console,
            controller,
            options,
        } = self;

        let mut writer_task = tokio::spawn(writer::run(
            input,
            session_writer.clone(),
            console.clone(),
            controller.signal(),
            options,
        ));

        let reader_loop = reader::run(session_reader, console, controller.signal());
        tokio::pin!(reader_loop);

        let mut writer_running = true;
        let result = loop {
            tokio::select! {
                exit = &mut reader_loop => break exit,
                joined = &mut writer_task, if writer_running => {
                    writer_running = false;
                    match joined {
                        Ok(Ok(exit)) => debug!("Writer finished: {:?}", exit),
                        Ok(Err(e)) => break Err(e),
                        Err(e) => break Err(RelayError::Task(e)),
                    }
                }
            }
        };

        writer_task.abort();

        match result? {
            ReaderExit::Cancelled => {
                // The controller may still be finishing the close handshake.
                // A stalled peer must not keep the process alive.
                if let Err(e) = session_writer.close_within(controller.close_timeout()).await {
                    warn!("Session did not close cleanly: {}", e);
                }
                Ok(RelayOutcome::Interrupted)
            }
            ReaderExit::Closed if controller.is_triggered() => Ok(RelayOutcome::Interrupted),
            ReaderExit::Closed => Ok(RelayOutcome::Closed),
        }
    }
}
