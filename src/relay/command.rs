//! Console line interpreter
//!
//! Every line typed by the operator is either literal text for the peer or the
//! `send_file('<path>')` escape command, which ships a local file as one binary
//! frame.

use std::path::PathBuf;

use thiserror::Error;

/// Prefix that marks a line as the file-send escape command
pub const SEND_FILE_PREFIX: &str = "send_file(";

/// One interpreted console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the line verbatim as a text frame
    Text(String),
    /// Read the file fully and send it as a single binary frame
    SendFile(PathBuf),
}

/// Malformed `send_file(...)` syntax
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("send_file: missing closing parenthesis, usage: send_file('<path>')")]
    Unterminated,
    #[error("send_file: path must be quoted with ' or \", usage: send_file('<path>')")]
    Unquoted,
    #[error("send_file: opening quote {0} is never closed")]
    MismatchedQuote(char),
    #[error("send_file: empty path")]
    EmptyPath,
}

/// Interpret one console line.
///
/// Lines that do not start with `send_file(` are always text, empty lines
/// included. A line that does start with it must be a complete command;
/// otherwise an error is returned instead of sending the line as text.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let Some(rest) = line.strip_prefix(SEND_FILE_PREFIX) else {
        return Ok(Command::Text(line.to_string()));
    };

    let argument = rest
        .strip_suffix(')')
        .ok_or(CommandError::Unterminated)?
        .trim();

    let quote = match argument.chars().next() {
        Some(quote @ ('\'' | '"')) => quote,
        _ => return Err(CommandError::Unquoted),
    };

    // Quotes are ASCII, so slicing one byte off the front is safe.
    let path = argument[1..]
        .strip_suffix(quote)
        .ok_or(CommandError::MismatchedQuote(quote))?;

    if path.is_empty() {
        return Err(CommandError::EmptyPath);
    }

    Ok(Command::SendFile(PathBuf::from(path)))
}
