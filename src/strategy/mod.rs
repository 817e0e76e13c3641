//! Run-sequence transcoders.
//!
//! Each strategy turns a run sequence into a JSON payload and back. The
//! payload shape is private to the strategy; keymaps store it verbatim.

mod fibonacci;
mod power;
mod rle;

pub use fibonacci::{zeckendorf, FibonacciStrategy};
pub use power::PowerStrategy;
pub use rle::RleStrategy;

use serde_json::Value;

use crate::bits::{Bit, BitRun};
use crate::{HodError, Result};

/// Strategy-specific re-encoding of a run sequence.
pub type Payload = Value;

/// Contract shared by every strategy.
///
/// `decode(encode(runs))` must return `runs` for any sequence whose counts
/// are all at least one.
pub trait Strategy: Send + Sync {
    /// Unique, user-facing name stored in the keymap.
    fn name(&self) -> &'static str;

    fn encode(&self, runs: &[BitRun]) -> Payload;

    fn decode(&self, payload: &Payload) -> Result<Vec<BitRun>>;
}

/// Every strategy shipped with the crate.
pub fn builtin() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(RleStrategy),
        Box::new(FibonacciStrategy),
        Box::new(PowerStrategy),
    ]
}

/// Top-level payload as a list, or a decode error naming the strategy.
fn payload_items<'a>(strategy: &str, payload: &'a Payload) -> Result<&'a [Value]> {
    payload
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            HodError::Decode(format!(
                "{strategy} payload must be a list of runs, found {}",
                kind_of(payload)
            ))
        })
}

/// Parse the bit half of a payload entry. Accepts `"0"`, `"1"`, `0` and `1`.
fn parse_bit(value: &Value) -> Option<Bit> {
    match value {
        Value::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Bit::from_char(c),
                _ => None,
            }
        }
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(Bit::Zero),
            Some(1) => Some(Bit::One),
            _ => None,
        },
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
