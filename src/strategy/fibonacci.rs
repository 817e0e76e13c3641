use serde_json::{json, Value};

use super::{parse_bit, payload_items, Payload, Strategy};
use crate::bits::BitRun;
use crate::{HodError, Result};

/// Zeckendorf representation of `n`: non-consecutive Fibonacci numbers from
/// the sequence 1, 2, 3, 5, 8, ... that sum to `n`, largest first.
///
/// `0` has no such representation and maps to `[0]`.
pub fn zeckendorf(mut n: u64) -> Vec<u64> {
    if n == 0 {
        return vec![0];
    }
    let mut fib = vec![1u64, 2];
    while let Some(&last) = fib.last() {
        if last > n {
            break;
        }
        let next = match last.checked_add(fib[fib.len() - 2]) {
            Some(next) => next,
            // Every Fibonacci number that fits in a u64 is now present.
            None => break,
        };
        fib.push(next);
    }

    let mut out = Vec::new();
    let mut i = fib.len();
    while n > 0 && i > 0 {
        i -= 1;
        if fib[i] <= n {
            out.push(fib[i]);
            n -= fib[i];
            // The predecessor would be adjacent; skip it.
            i = i.saturating_sub(1);
        }
    }
    out
}

/// Replaces each run length with its Zeckendorf addends: `[bit, [addends]]`.
pub struct FibonacciStrategy;

impl Strategy for FibonacciStrategy {
    fn name(&self) -> &'static str {
        "fibonacci"
    }

    fn encode(&self, runs: &[BitRun]) -> Payload {
        Value::Array(
            runs.iter()
                .map(|r| json!([r.bit.to_string(), zeckendorf(r.count)]))
                .collect(),
        )
    }

    /// Sums each addend list. Non-adjacency is not re-checked.
    fn decode(&self, payload: &Payload) -> Result<Vec<BitRun>> {
        payload_items(self.name(), payload)?
            .iter()
            .enumerate()
            .map(|(i, item)| decode_entry(i, item))
            .collect()
    }
}

fn decode_entry(index: usize, item: &Value) -> Result<BitRun> {
    let bad = |why: &str| HodError::Decode(format!("fibonacci entry {index} ({item}): {why}"));
    let pair = match item.as_array() {
        Some(pair) if pair.len() == 2 => pair,
        _ => return Err(bad("expected a [bit, [addends]] pair")),
    };
    let bit = parse_bit(&pair[0]).ok_or_else(|| bad("bit must be '0' or '1'"))?;
    let addends = pair[1]
        .as_array()
        .ok_or_else(|| bad("addends must be a list"))?;
    let mut count = 0u64;
    for addend in addends {
        let value = addend
            .as_u64()
            .ok_or_else(|| bad("addends must be non-negative integers"))?;
        count = count
            .checked_add(value)
            .ok_or_else(|| bad("addends overflow a 64-bit count"))?;
    }
    Ok(BitRun::new(bit, count))
}
