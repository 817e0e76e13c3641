//! Content hashing and keyed payload signatures.
//!
//! The file hash is a best-effort sanity check: anyone can recompute it, so a
//! mismatch is only ever reported. The HMAC signature binds a payload to a
//! passphrase and a mismatch stops decoding.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use md5::Md5;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

use crate::io_utils::io_error;
use crate::{HodError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Digest algorithms accepted for the file hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
    /// Legacy fast hash, kept for keymaps produced by older tools.
    Md5,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [Self::Sha256, Self::Sha512, Self::Md5];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Md5 => "md5",
        }
    }

    pub fn hasher(self) -> FileHasher {
        match self {
            Self::Sha256 => FileHasher::Sha256(Sha256::new()),
            Self::Sha512 => FileHasher::Sha512(Sha512::new()),
            Self::Md5 => FileHasher::Md5(Md5::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HodError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|a| a.name()).collect();
                HodError::Config(format!(
                    "unknown hash algorithm '{s}'. Available: {}",
                    names.join(", ")
                ))
            })
    }
}

/// Incremental digest for one of the supported algorithms.
#[derive(Clone)]
pub enum FileHasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Md5(Md5),
}

impl FileHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    /// Lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Reader adapter that counts bytes and optionally hashes them as they pass.
///
/// Lets the encoder size, hash and extract the input in a single pass.
pub struct IntegrityReader<R> {
    inner: R,
    hasher: Option<FileHasher>,
    bytes_read: u64,
}

impl<R: Read> IntegrityReader<R> {
    pub fn new(inner: R, algorithm: Option<HashAlgorithm>) -> Self {
        Self {
            inner,
            hasher: algorithm.map(HashAlgorithm::hasher),
            bytes_read: 0,
        }
    }

    /// Byte count and hex digest (if hashing) of everything read so far.
    pub fn finish(self) -> (u64, Option<String>) {
        (self.bytes_read, self.hasher.map(FileHasher::finalize_hex))
    }
}

impl<R: Read> Read for IntegrityReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(h) = self.hasher.as_mut() {
            h.update(&buf[..n]);
        }
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Hex digest of an in-memory buffer.
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut h = algorithm.hasher();
    h.update(data);
    h.finalize_hex()
}

/// Hex digest of everything `reader` yields, read in 8 KiB chunks.
pub fn hash_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> io::Result<String> {
    let mut h = algorithm.hasher();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => h.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(h.finalize_hex())
}

pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let file = File::open(path).map_err(|e| {
        HodError::Input(io_error("opening input file", path, e).to_string())
    })?;
    hash_reader(file, algorithm)
        .map_err(|e| HodError::Input(io_error("reading input file", path, e).to_string()))
}

/// Outcome of comparing a reconstructed file against the stored hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCheck {
    /// The keymap carries no file hash.
    NotRecorded,
    Match { algorithm: HashAlgorithm },
    Mismatch {
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },
    /// The stored algorithm name is not one we can compute.
    Unsupported { algorithm: String },
}

impl HashCheck {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

/// Compare `data` with a stored digest. Never fails: problems are reported
/// through the returned [`HashCheck`].
pub fn check_hash(data: &[u8], algorithm: Option<&str>, expected: Option<&str>) -> HashCheck {
    let Some(expected) = expected else {
        return HashCheck::NotRecorded;
    };
    // No algorithm recorded: sha256, the encoder's default.
    let name = algorithm.unwrap_or("sha256");
    let Ok(algorithm) = name.parse::<HashAlgorithm>() else {
        return HashCheck::Unsupported {
            algorithm: name.to_string(),
        };
    };
    let actual = hash_bytes(data, algorithm);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        HashCheck::Match { algorithm }
    } else {
        HashCheck::Mismatch {
            algorithm,
            expected: expected.to_string(),
            actual,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical payload form

/// Signature wire form: `", "` and `": "` separators, `\uXXXX` escapes for
/// non-ASCII text. Keys come out sorted because `serde_json::Map` is a
/// `BTreeMap`; enabling `preserve_order` would break signatures.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Deterministic byte form of a payload. Semantically equal payloads produce
/// identical bytes regardless of object key order.
pub fn canonical_json(payload: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    payload
        .serialize(&mut ser)
        .map_err(|e| HodError::Integrity(format!("canonicalizing payload: {e}")))?;
    Ok(out)
}

fn payload_mac(payload: &Value, passphrase: &str) -> Result<HmacSha256> {
    let canonical = canonical_json(payload)?;
    let mut mac = HmacSha256::new_from_slice(passphrase.as_bytes())
        .map_err(|e| HodError::Integrity(format!("invalid signing key: {e}")))?;
    mac.update(&canonical);
    Ok(mac)
}

/// HMAC-SHA256 of the canonical payload, keyed by `passphrase`, as hex.
pub fn sign_payload(payload: &Value, passphrase: &str) -> Result<String> {
    let mac = payload_mac(payload, passphrase)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of `signature` against the payload. Signatures that
/// are not valid hex simply fail to verify.
pub fn verify_payload(payload: &Value, signature: &str, passphrase: &str) -> Result<bool> {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return Ok(false);
    };
    let mac = payload_mac(payload, passphrase)?;
    Ok(mac.verify_slice(&expected).is_ok())
}
