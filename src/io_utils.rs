//! Error plumbing shared by the command-line tools.

use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::HodError;

/// Error shown to the user by the command-line tools: a rendered message plus
/// the underlying cause.
#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CliError {
    fn new(msg: String, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self { msg, source }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<HodError> for CliError {
    fn from(err: HodError) -> Self {
        let msg = cli_hint(&err);
        Self::new(msg, Some(Box::new(err)))
    }
}

/// What the user can do about an I/O failure of a given kind.
fn io_hint(err: &io::Error) -> &'static str {
    match err.kind() {
        ErrorKind::NotFound => "Check that the file exists and the path is correct.",
        ErrorKind::PermissionDenied => "Check the file and directory permissions.",
        ErrorKind::InvalidData => "The file is not UTF-8 text; is it really a keymap?",
        ErrorKind::UnexpectedEof => "The file looks truncated.",
        ErrorKind::WriteZero => "The disk may be full.",
        _ if err.raw_os_error() == Some(28) => "The disk may be full.",
        _ => "Check the path, permissions and free disk space.",
    }
}

/// `"Error <operation> '<path>': <cause>. <hint>"`.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    format!("Error {operation} '{}': {err}. {}", path.display(), io_hint(err))
}

/// CLI error for a failed file operation.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError::new(format_io_error(operation, path, &err), Some(Box::new(err)))
}

/// Same error kind, message rewritten with the path and a hint.
pub fn io_error(operation: &str, path: &Path, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), format_io_error(operation, path, &err))
}

pub fn simple_cli_error(msg: &str) -> CliError {
    CliError::new(msg.to_string(), None)
}

/// Library error with a leading context, e.g. `"decode failed: ..."`.
pub fn hod_cli_error(context: &str, err: HodError) -> CliError {
    let mut cli = CliError::from(err);
    cli.msg = format!("{context}: {}", cli.msg);
    cli
}

/// The error message followed by an actionable hint for its variant.
pub fn cli_hint(err: &HodError) -> String {
    use crate::HodError::*;
    match err {
        Input(msg) => msg.clone(),
        Strategy(msg) => format!("{msg}. Run `hod list` to see the available strategies."),
        Format(msg) => format!("{msg}. Verify the keymap is intact."),
        MissingField(field) => format!(
            "keymap is missing required field '{field}'. Verify the keymap is intact."
        ),
        Decode(msg) => format!("{msg}. The payload is malformed; re-encode the original file."),
        Integrity(msg) => format!("{msg}. Nothing was written."),
        Reconstruction(msg) => format!("{msg}. The payload does not describe whole bytes."),
        Config(msg) => format!("{msg}. Invalid option."),
        Io(io) => format!("{io}"),
    }
}

/// Write `data` to `path` through a sibling temporary file that is renamed
/// into place. On error `path` is unchanged and the temporary is removed.
pub fn write_atomic(operation: &str, path: &Path, data: &[u8]) -> io::Result<()> {
    let partial = partial_path(path);
    let result = fs::write(&partial, data).and_then(|()| fs::rename(&partial, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(io_error(operation, path, e));
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.partial", std::process::id()))
}
