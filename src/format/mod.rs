//! Keymap text formats.

mod conf;
mod json;

pub use conf::ConfFormat;
pub use json::JsonFormat;

use crate::keymap::Keymap;
use crate::Result;

/// A text representation of a keymap.
///
/// `deserialize(serialize(k))` must yield a keymap equal to `k`.
pub trait KeymapFormat: Send + Sync {
    /// Unique name used with `--format`.
    fn name(&self) -> &'static str;

    /// Default file extension, including the leading dot.
    fn extension(&self) -> &'static str;

    fn serialize(&self, keymap: &Keymap) -> Result<String>;

    fn deserialize(&self, text: &str) -> Result<Keymap>;
}

/// Every format shipped with the crate.
pub fn builtin() -> Vec<Box<dyn KeymapFormat>> {
    vec![Box::new(JsonFormat), Box::new(ConfFormat)]
}
