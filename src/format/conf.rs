//! Section-based keymap format.
//!
//! ```text
//! [hod_metadata]
//! hod_version = 2.0
//! strategy = power
//! ...
//! integrity = {"file_hash_algorithm":"sha256",...}
//!
//! [hod_payload]
//! data = ["1^8"]
//! ```
//!
//! Nested values (`integrity`, the payload) are stored as embedded JSON
//! strings. Values are trimmed, so leading or trailing whitespace in the
//! original filename does not survive this format.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::{Map, Value};

use super::KeymapFormat;
use crate::keymap::Keymap;
use crate::{HodError, Result};

const METADATA: &str = "hod_metadata";
const PAYLOAD: &str = "hod_payload";
const PAYLOAD_KEY: &str = "data";

type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// INI-style sections. Extension `.conf`.
pub struct ConfFormat;

impl KeymapFormat for ConfFormat {
    fn name(&self) -> &'static str {
        "conf"
    }

    fn extension(&self) -> &'static str {
        ".conf"
    }

    fn serialize(&self, keymap: &Keymap) -> Result<String> {
        let integrity = to_json(&keymap.integrity, "integrity")?;
        let payload = to_json(&keymap.payload, "payload")?;
        let metadata = [
            ("hod_version", Some(keymap.version.clone())),
            ("hod_created_utc", Some(keymap.created_utc.clone())),
            ("strategy", Some(keymap.strategy_name.clone())),
            ("original_filename", Some(keymap.original_filename.clone())),
            ("input_size_bytes", keymap.input_size_bytes.map(|n| n.to_string())),
            ("integrity", Some(integrity)),
        ];

        let mut out = String::new();
        let _ = writeln!(out, "[{METADATA}]");
        for (key, value) in &metadata {
            if let Some(value) = value {
                write_entry(&mut out, key, value)?;
            }
        }
        let _ = writeln!(out, "\n[{PAYLOAD}]");
        write_entry(&mut out, PAYLOAD_KEY, &payload)?;
        out.push('\n');
        Ok(out)
    }

    fn deserialize(&self, text: &str) -> Result<Keymap> {
        let mut sections = parse_sections(text)?;
        let meta = sections
            .remove(METADATA)
            .ok_or_else(|| HodError::Format(format!("missing [{METADATA}] section")))?;

        let mut doc = Map::new();
        for (key, raw) in meta {
            let value = match key.as_str() {
                "integrity" => from_json(&raw, "integrity")?,
                "input_size_bytes" => {
                    let size: u64 = raw.parse().map_err(|_| {
                        HodError::Format(format!(
                            "input_size_bytes must be a non-negative integer, found {raw:?}"
                        ))
                    })?;
                    Value::from(size)
                }
                _ => Value::String(raw),
            };
            doc.insert(key, value);
        }

        if let Some(raw) = sections
            .get_mut(PAYLOAD)
            .and_then(|s| s.remove(PAYLOAD_KEY))
        {
            doc.insert("payload".into(), from_json(&raw, "payload")?);
        }
        Keymap::from_document(Value::Object(doc))
    }
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| HodError::Format(format!("encoding {what}: {e}")))
}

fn from_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| HodError::Format(format!("malformed {what} JSON: {e}")))
}

fn write_entry(out: &mut String, key: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(HodError::Format(format!(
            "value of '{key}' contains a line break and cannot be stored in a conf keymap"
        )));
    }
    let _ = writeln!(out, "{key} = {value}");
    Ok(())
}

/// Parse `[section]` headers and `key = value` / `key: value` entries.
/// Keys are case-insensitive; `#` and `;` start comment lines; indented
/// lines continue the previous value.
fn parse_sections(text: &str) -> Result<Sections> {
    let mut sections = Sections::new();
    let mut section: Option<String> = None;
    let mut last_key: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let (Some(s), Some(k)) = (&section, &last_key) {
                if let Some(value) = sections.get_mut(s).and_then(|m| m.get_mut(k)) {
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }
        }

        if let Some(name) = trimmed.strip_prefix('[') {
            let name = name
                .strip_suffix(']')
                .ok_or_else(|| HodError::Format(format!("line {lineno}: unterminated section header")))?
                .trim()
                .to_string();
            if sections.contains_key(&name) {
                return Err(HodError::Format(format!(
                    "line {lineno}: duplicate section [{name}]"
                )));
            }
            sections.insert(name.clone(), BTreeMap::new());
            section = Some(name);
            last_key = None;
            continue;
        }

        let Some(current) = &section else {
            return Err(HodError::Format(format!(
                "line {lineno}: entry outside of any section"
            )));
        };
        let split = trimmed
            .find(['=', ':'])
            .ok_or_else(|| HodError::Format(format!("line {lineno}: expected 'key = value'")))?;
        let key = trimmed[..split].trim().to_ascii_lowercase();
        let value = trimmed[split + 1..].trim().to_string();
        if key.is_empty() {
            return Err(HodError::Format(format!("line {lineno}: empty key")));
        }
        let entries = sections.entry(current.clone()).or_default();
        if entries.insert(key.clone(), value).is_some() {
            return Err(HodError::Format(format!(
                "line {lineno}: duplicate key '{key}' in [{current}]"
            )));
        }
        last_key = Some(key);
    }
    Ok(sections)
}
