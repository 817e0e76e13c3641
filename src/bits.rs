//! Bit run extraction and reassembly.
//!
//! Bits are read most significant first within each byte. A run sequence
//! produced by [`BitRuns`] is maximal: no two neighbouring runs carry the same
//! bit, and the counts add up to eight times the number of input bytes.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, BufReader, Read};

use crate::{HodError, Result};

/// Default read buffer used by [`BitRuns::new`].
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A single binary digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    /// Bit at `pos` (0 = most significant) of `byte`.
    pub fn of(byte: u8, pos: u32) -> Self {
        if (byte >> (7 - pos)) & 1 == 1 {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Bit::Zero),
            '1' => Some(Bit::One),
            _ => None,
        }
    }

    /// The byte made of eight copies of this bit.
    fn fill_byte(self) -> u8 {
        match self {
            Bit::Zero => 0x00,
            Bit::One => 0xFF,
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A run of identical bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRun {
    pub bit: Bit,
    pub count: u64,
}

impl BitRun {
    pub fn new(bit: Bit, count: u64) -> Self {
        Self { bit, count }
    }
}

/// Incremental run state shared by the streaming and in-memory extractors.
#[derive(Default)]
struct RunBuilder {
    current: Option<BitRun>,
    ready: VecDeque<BitRun>,
}

impl RunBuilder {
    /// Feed one byte, queueing every run it closes.
    fn push_byte(&mut self, byte: u8) {
        if let Some(run) = self.current.as_mut() {
            if byte == run.bit.fill_byte() {
                run.count += 8;
                return;
            }
        }
        for pos in 0..8 {
            let bit = Bit::of(byte, pos);
            match self.current.as_mut() {
                Some(run) if run.bit == bit => run.count += 1,
                _ => {
                    if let Some(closed) = self.current.replace(BitRun::new(bit, 1)) {
                        self.ready.push_back(closed);
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> Option<BitRun> {
        self.current.take()
    }
}

/// Lazy, forward-only run extractor over any reader.
///
/// The reader is consumed through a buffer and never rewound, so restarting
/// extraction means reopening the source. Memory held by the iterator is
/// constant; only the caller's collected sequence grows.
pub struct BitRuns<R: Read> {
    reader: BufReader<R>,
    builder: RunBuilder,
    done: bool,
}

impl<R: Read> BitRuns<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity.max(1), reader),
            builder: RunBuilder::default(),
            done: false,
        }
    }

    /// Consume one buffer's worth of input. Returns `false` at end of stream.
    fn fill(&mut self) -> Result<bool> {
        let chunk = match self.reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return Ok(true),
            Err(e) => return Err(HodError::Input(format!("reading input: {e}"))),
        };
        if chunk.is_empty() {
            return Ok(false);
        }
        for byte in chunk {
            self.builder.push_byte(*byte);
        }
        let consumed = chunk.len();
        self.reader.consume(consumed);
        Ok(true)
    }
}

impl<R: Read> Iterator for BitRuns<R> {
    type Item = Result<BitRun>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(run) = self.builder.ready.pop_front() {
                return Some(Ok(run));
            }
            if self.done {
                return None;
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return self.builder.finish().map(Ok);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Collect the full run sequence of a reader.
pub fn extract<R: Read>(reader: R) -> Result<Vec<BitRun>> {
    BitRuns::new(reader).collect()
}

/// Run sequence of an in-memory buffer.
pub fn extract_bytes(data: &[u8]) -> Vec<BitRun> {
    let mut builder = RunBuilder::default();
    for byte in data {
        builder.push_byte(*byte);
    }
    let mut out: Vec<BitRun> = builder.ready.drain(..).collect();
    out.extend(builder.finish());
    out
}

/// Total number of bits described by `runs`, or `None` on overflow.
pub fn total_bits(runs: &[BitRun]) -> Option<u64> {
    runs.iter().try_fold(0u64, |acc, r| acc.checked_add(r.count))
}

/// Pack a run sequence back into bytes, MSB first.
///
/// The total bit count must be a whole number of bytes; anything else is
/// rejected rather than padded. Zero-length runs contribute nothing.
pub fn assemble(runs: &[BitRun]) -> Result<Vec<u8>> {
    assemble_with_limit(runs, u64::MAX)
}

/// Like [`assemble`] but refuses to produce more than `max_bytes` bytes.
/// The check runs before any allocation.
pub fn assemble_with_limit(runs: &[BitRun], max_bytes: u64) -> Result<Vec<u8>> {
    let bits = total_bits(runs).ok_or_else(|| {
        HodError::Reconstruction("total bit count overflows a 64-bit integer".into())
    })?;
    if bits % 8 != 0 {
        return Err(HodError::Reconstruction(format!(
            "run sequence covers {bits} bits, which is not a whole number of bytes ({} trailing bits)",
            bits % 8
        )));
    }
    let len = bits / 8;
    if len > max_bytes {
        return Err(HodError::Reconstruction(format!(
            "run sequence describes {len} bytes, above the limit of {max_bytes}"
        )));
    }
    let len = usize::try_from(len).map_err(|_| {
        HodError::Reconstruction(format!("{len} bytes do not fit in memory on this platform"))
    })?;

    let mut out = Vec::with_capacity(len);
    let mut byte = 0u8;
    let mut used = 0u32;
    for run in runs {
        let mut remaining = run.count;
        // Finish the partial byte bit by bit.
        while remaining > 0 && used != 0 {
            byte = (byte << 1) | (run.bit == Bit::One) as u8;
            used += 1;
            remaining -= 1;
            if used == 8 {
                out.push(byte);
                byte = 0;
                used = 0;
            }
        }
        // Whole bytes in one go.
        let whole = remaining / 8;
        if whole > 0 {
            out.resize(out.len() + whole as usize, run.bit.fill_byte());
            remaining %= 8;
        }
        for _ in 0..remaining {
            byte = (byte << 1) | (run.bit == Bit::One) as u8;
            used += 1;
        }
    }
    debug_assert_eq!(used, 0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(bit: char, count: u64) -> BitRun {
        BitRun::new(Bit::from_char(bit).unwrap(), count)
    }

    #[test]
    fn empty_input_has_no_runs() {
        assert!(extract_bytes(&[]).is_empty());
        assert!(extract(&[0u8; 0][..]).unwrap().is_empty());
        assert_eq!(assemble(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn single_ff_byte() {
        assert_eq!(extract_bytes(&[0xFF]), vec![run('1', 8)]);
        assert_eq!(extract_bytes(&[0x00]), vec![run('0', 8)]);
    }

    #[test]
    fn uniform_file_is_one_run() {
        let data = vec![0xFFu8; 1000];
        assert_eq!(extract_bytes(&data), vec![run('1', 8000)]);
    }

    #[test]
    fn msb_first_order() {
        // 0b1000_0001
        assert_eq!(
            extract_bytes(&[0x81]),
            vec![run('1', 1), run('0', 6), run('1', 1)]
        );
        // 0x0F 0xF0 joins across the byte boundary
        assert_eq!(
            extract_bytes(&[0x0F, 0xF0]),
            vec![run('0', 4), run('1', 8), run('0', 4)]
        );
    }

    #[test]
    fn alternating_bits_produce_one_run_per_bit() {
        let runs = extract_bytes(&[0xAA, 0xAA]);
        assert_eq!(runs.len(), 16);
        assert!(runs.iter().all(|r| r.count == 1));
    }

    #[test]
    fn streaming_matches_in_memory_with_tiny_buffer() {
        let data: Vec<u8> = (0u8..=255).chain([0, 0, 0xFF, 0xFF, 0x0F]).collect();
        let streamed: Vec<BitRun> = BitRuns::with_capacity(3, &data[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(streamed, extract_bytes(&data));
    }

    #[test]
    fn runs_are_maximal() {
        let data: Vec<u8> = (0u8..=255).collect();
        let runs = extract_bytes(&data);
        for pair in runs.windows(2) {
            assert_ne!(pair[0].bit, pair[1].bit);
        }
        assert_eq!(total_bits(&runs), Some(256 * 8));
    }

    #[test]
    fn assemble_rejects_partial_bytes() {
        let err = assemble(&[run('1', 7)]).unwrap_err();
        assert!(matches!(err, HodError::Reconstruction(_)));
        assert!(err.to_string().contains("7 bits"));
    }

    #[test]
    fn assemble_respects_limit() {
        let err = assemble_with_limit(&[run('0', 8 * 10)], 9).unwrap_err();
        assert!(matches!(err, HodError::Reconstruction(_)));
        assert_eq!(assemble_with_limit(&[run('0', 80)], 10).unwrap(), vec![0; 10]);
    }

    #[test]
    fn assemble_rejects_overflowing_counts() {
        let runs = [run('1', u64::MAX), run('0', 8)];
        assert!(matches!(
            assemble(&runs),
            Err(HodError::Reconstruction(_))
        ));
    }

    #[test]
    fn zero_length_runs_are_ignored() {
        let runs = [run('1', 4), run('0', 0), run('1', 4)];
        assert_eq!(assemble(&runs).unwrap(), vec![0xFF]);
    }

    #[test]
    fn roundtrip_mixed() {
        let data = b"\x00\x01\x7f\x80\xfe\xffhello world";
        assert_eq!(assemble(&extract_bytes(data)).unwrap(), data.to_vec());
    }
}
