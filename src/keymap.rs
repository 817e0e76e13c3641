//! The persisted keymap structure.
//!
//! Field names on disk are fixed (`hod_version`, `strategy`, ...) so keymaps
//! stay readable by every tool that speaks this layout.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::integrity::HashAlgorithm;
use crate::strategy::Payload;
use crate::{HodError, Result};

/// Layout version written into every new keymap.
pub const KEYMAP_VERSION: &str = "2.0";

/// Optional integrity metadata. A `None` field was not requested; it never
/// means a check failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityBlock {
    #[serde(rename = "file_hash_algorithm", default)]
    pub hash_algorithm: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(rename = "payload_hmac_signature", default)]
    pub hmac_signature: Option<String>,
}

/// Metadata, integrity block and strategy payload of one encoded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keymap {
    #[serde(rename = "hod_version", default = "default_version")]
    pub version: String,
    #[serde(rename = "hod_created_utc", default)]
    pub created_utc: String,
    #[serde(rename = "strategy")]
    pub strategy_name: String,
    #[serde(default)]
    pub original_filename: String,
    /// Size of the encoded input. `None` when an older or hand-written
    /// keymap does not record it.
    #[serde(default)]
    pub input_size_bytes: Option<u64>,
    #[serde(default)]
    pub integrity: IntegrityBlock,
    pub payload: Payload,
}

fn default_version() -> String {
    KEYMAP_VERSION.to_string()
}

impl Keymap {
    /// Project a parsed document onto a keymap.
    ///
    /// `strategy` and `payload` are required and reported by name when absent
    /// or null. Other metadata falls back to defaults.
    pub fn from_document(doc: Value) -> Result<Self> {
        let mut map = match doc {
            Value::Object(map) => map,
            other => {
                return Err(HodError::Format(format!(
                    "keymap must be an object, found {}",
                    match other {
                        Value::Array(_) => "a list",
                        Value::String(_) => "a string",
                        Value::Number(_) => "a number",
                        Value::Bool(_) => "a boolean",
                        _ => "null",
                    }
                )))
            }
        };
        for field in ["strategy", "payload"] {
            if matches!(map.get(field), None | Some(Value::Null)) {
                return Err(HodError::MissingField(field));
            }
        }
        // Section-based formats may hand the version back as a number.
        if let Some(Value::Number(n)) = map.get("hod_version") {
            let version = n.to_string();
            map.insert("hod_version".into(), Value::String(version));
        }
        if matches!(map.get("integrity"), Some(Value::Null)) {
            map.remove("integrity");
        }
        serde_json::from_value(Value::Object(map))
            .map_err(|e| HodError::Format(format!("invalid keymap: {e}")))
    }

    pub fn is_signed(&self) -> bool {
        self.integrity.hmac_signature.is_some()
    }

    /// Creation time, if the stored timestamp parses as RFC 3339.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_utc)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Assembles a [`Keymap`] from values produced elsewhere. Performs no
/// encoding, hashing or I/O; the only side effect is reading the clock when
/// no timestamp was supplied.
#[derive(Debug, Clone)]
pub struct KeymapBuilder {
    strategy_name: String,
    payload: Payload,
    original_filename: String,
    input_size_bytes: u64,
    integrity: IntegrityBlock,
    created: Option<DateTime<Utc>>,
}

impl KeymapBuilder {
    pub fn new(strategy_name: impl Into<String>, payload: Payload) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            payload,
            original_filename: String::new(),
            input_size_bytes: 0,
            integrity: IntegrityBlock::default(),
            created: None,
        }
    }

    /// Record the input name. Only the final path component is kept.
    pub fn original_filename(mut self, path: impl AsRef<Path>) -> Self {
        self.original_filename = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self
    }

    pub fn input_size(mut self, bytes: u64) -> Self {
        self.input_size_bytes = bytes;
        self
    }

    pub fn file_hash(mut self, algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        self.integrity.hash_algorithm = Some(algorithm.name().to_string());
        self.integrity.file_hash = Some(digest.into());
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.integrity.hmac_signature = Some(signature.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created = Some(at);
        self
    }

    pub fn build(self) -> Keymap {
        let created = self.created.unwrap_or_else(Utc::now);
        Keymap {
            version: KEYMAP_VERSION.to_string(),
            created_utc: created.to_rfc3339_opts(SecondsFormat::Micros, false),
            strategy_name: self.strategy_name,
            original_filename: self.original_filename,
            input_size_bytes: Some(self.input_size_bytes),
            integrity: self.integrity,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Keymap {
        KeymapBuilder::new("power", json!(["1^8"]))
            .original_filename("/tmp/some/dir/input.bin")
            .input_size(1)
            .file_hash(HashAlgorithm::Sha256, "ab")
            .created_at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .build()
    }

    #[test]
    fn builder_keeps_basename_and_metadata() {
        let km = sample();
        assert_eq!(km.version, KEYMAP_VERSION);
        assert_eq!(km.original_filename, "input.bin");
        assert_eq!(km.created_utc, "2024-05-01T12:00:00.000000+00:00");
        assert_eq!(km.integrity.hash_algorithm.as_deref(), Some("sha256"));
        assert!(!km.is_signed());
        assert_eq!(
            km.created_at(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn serialized_field_names() {
        let doc = serde_json::to_value(sample()).unwrap();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        for key in [
            "hod_version",
            "hod_created_utc",
            "strategy",
            "original_filename",
            "input_size_bytes",
            "integrity",
            "payload",
        ] {
            assert!(keys.iter().any(|k| k == key), "missing {key}");
        }
        assert_eq!(doc["integrity"]["payload_hmac_signature"], Value::Null);
    }

    #[test]
    fn document_roundtrip() {
        let km = sample();
        let doc = serde_json::to_value(&km).unwrap();
        assert_eq!(Keymap::from_document(doc).unwrap(), km);
    }

    #[test]
    fn missing_required_fields_are_named() {
        let err = Keymap::from_document(json!({"payload": []})).unwrap_err();
        assert!(matches!(err, HodError::MissingField("strategy")));
        let err = Keymap::from_document(json!({"strategy": "rle", "payload": null})).unwrap_err();
        assert!(matches!(err, HodError::MissingField("payload")));
    }

    #[test]
    fn lenient_optional_fields() {
        let km = Keymap::from_document(json!({
            "hod_version": 2.0,
            "strategy": "rle",
            "integrity": null,
            "payload": [["1", 8]],
        }))
        .unwrap();
        assert_eq!(km.version, "2.0");
        assert_eq!(km.integrity, IntegrityBlock::default());
        assert_eq!(km.input_size_bytes, None);
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            Keymap::from_document(json!([1, 2])),
            Err(HodError::Format(_))
        ));
    }
}
