use thiserror::Error;

/// Errors produced while encoding or decoding a keymap.
#[derive(Error, Debug)]
pub enum HodError {
    /// Input file missing or unreadable.
    #[error("input error: {0}")]
    Input(String),

    /// Unknown or missing strategy name.
    #[error("strategy error: {0}")]
    Strategy(String),

    /// Unknown format or extension, or malformed serialized text.
    #[error("format error: {0}")]
    Format(String),

    /// A required keymap field is absent.
    #[error("format error: keymap is missing required field '{0}'")]
    MissingField(&'static str),

    /// Malformed strategy-specific payload entry.
    #[error("decode error: {0}")]
    Decode(String),

    /// Signature mismatch or missing passphrase. Always fatal.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Decoded runs cannot be packed back into whole bytes.
    #[error("reconstruction error: {0}")]
    Reconstruction(String),

    /// Invalid option value.
    #[error("config error: {0}")]
    Config(String),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HodError>;
