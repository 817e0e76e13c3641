use serde_json::Value;

use super::{payload_items, Payload, Strategy};
use crate::bits::{Bit, BitRun};
use crate::{HodError, Result};

/// Renders each run as a `"<bit>^<count>"` token.
pub struct PowerStrategy;

impl Strategy for PowerStrategy {
    fn name(&self) -> &'static str {
        "power"
    }

    fn encode(&self, runs: &[BitRun]) -> Payload {
        Value::Array(
            runs.iter()
                .map(|r| Value::String(format!("{}^{}", r.bit, r.count)))
                .collect(),
        )
    }

    /// Fails on the first token that is not exactly `digit ^ digits`; no
    /// partial result is returned.
    fn decode(&self, payload: &Payload) -> Result<Vec<BitRun>> {
        payload_items(self.name(), payload)?
            .iter()
            .map(|item| match item.as_str() {
                Some(token) => parse_token(token),
                None => Err(HodError::Decode(format!(
                    "invalid power notation item: {item} (expected a \"bit^count\" string)"
                ))),
            })
            .collect()
    }
}

fn parse_token(token: &str) -> Result<BitRun> {
    let invalid = || HodError::Decode(format!("invalid power notation item: {token:?}"));
    let (digit, count) = token.split_once('^').ok_or_else(invalid)?;
    let mut digits = digit.chars();
    let bit_char = match (digits.next(), digits.next()) {
        (Some(c), None) if c.is_ascii_digit() => c,
        _ => return Err(invalid()),
    };
    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let bit = Bit::from_char(bit_char).ok_or_else(|| {
        HodError::Decode(format!(
            "invalid power notation item: {token:?} (bit must be 0 or 1)"
        ))
    })?;
    let count = count.parse::<u64>().map_err(|_| {
        HodError::Decode(format!(
            "invalid power notation item: {token:?} (count does not fit in 64 bits)"
        ))
    })?;
    Ok(BitRun::new(bit, count))
}
