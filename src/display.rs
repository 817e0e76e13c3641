//! Human-readable payload preview.

use std::fmt::Write as _;

use serde_json::Value;

use crate::strategy::Payload;

/// Render the first `limit` payload entries, one per line.
///
/// Entries are shown in their stored strategy form, not decoded back to runs.
pub fn render_payload(strategy_name: &str, payload: &Payload, limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- HoD Symbolic Payload ---");
    let _ = writeln!(out, "Strategy: {strategy_name}");
    match payload {
        Value::Array(items) if !items.is_empty() => {
            for (i, item) in items.iter().take(limit).enumerate() {
                let _ = writeln!(out, "  Run {:03}: {}", i + 1, render_item(item));
            }
            if items.len() > limit {
                let _ = writeln!(out, "  ... and {} more runs.", items.len() - limit);
            }
        }
        other => {
            let text = other.to_string();
            let clipped: String = text.chars().take(200).collect();
            let _ = writeln!(out, "  Payload: {clipped}...");
        }
    }
    let _ = writeln!(out, "----------------------------");
    out
}

fn render_item(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
