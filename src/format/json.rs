use serde_json::Value;

use super::KeymapFormat;
use crate::keymap::Keymap;
use crate::{HodError, Result};

/// Structured JSON, nested fields kept as is. Extension `.hod`.
pub struct JsonFormat;

impl KeymapFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        ".hod"
    }

    fn serialize(&self, keymap: &Keymap) -> Result<String> {
        serde_json::to_string_pretty(keymap)
            .map_err(|e| HodError::Format(format!("writing JSON keymap: {e}")))
    }

    fn deserialize(&self, text: &str) -> Result<Keymap> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| HodError::Format(format!("malformed JSON keymap: {e}")))?;
        Keymap::from_document(doc)
    }
}
