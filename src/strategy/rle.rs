use serde_json::{json, Value};

use super::{parse_bit, payload_items, Payload, Strategy};
use crate::bits::BitRun;
use crate::{HodError, Result};

/// Identity strategy: the payload is the run sequence as `[bit, count]` pairs.
pub struct RleStrategy;

impl Strategy for RleStrategy {
    fn name(&self) -> &'static str {
        "rle"
    }

    fn encode(&self, runs: &[BitRun]) -> Payload {
        Value::Array(
            runs.iter()
                .map(|r| json!([r.bit.to_string(), r.count]))
                .collect(),
        )
    }

    fn decode(&self, payload: &Payload) -> Result<Vec<BitRun>> {
        payload_items(self.name(), payload)?
            .iter()
            .enumerate()
            .map(|(i, item)| decode_pair(i, item))
            .collect()
    }
}

fn decode_pair(index: usize, item: &Value) -> Result<BitRun> {
    let bad = |why: &str| HodError::Decode(format!("rle entry {index} ({item}): {why}"));
    let pair = match item.as_array() {
        Some(pair) if pair.len() == 2 => pair,
        _ => return Err(bad("expected a [bit, count] pair")),
    };
    let bit = parse_bit(&pair[0]).ok_or_else(|| bad("bit must be '0' or '1'"))?;
    let count = parse_count(&pair[1]).ok_or_else(|| bad("count must be a non-negative integer"))?;
    Ok(BitRun::new(bit, count))
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}
