//! Encode and decode state machines.
//!
//! Encode: read → extract → strategy encode → sign (optional) → serialize.
//! Decode: deserialize → verify signature (optional, fatal) → strategy decode
//! → reconstruct → verify file hash (optional, warning only) → write.
//!
//! Decode writes nothing until every fatal check has passed and the whole
//! output has been rebuilt in memory.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};

use crate::bits::{assemble_with_limit, total_bits, BitRuns};
use crate::config::Config;
use crate::display::render_payload;
use crate::format::KeymapFormat;
use crate::integrity::{check_hash, sign_payload, verify_payload, HashAlgorithm, HashCheck, IntegrityReader};
use crate::io_utils::{io_error, write_atomic};
use crate::keymap::{Keymap, KeymapBuilder};
use crate::registry::Registry;
use crate::{HodError, Result};

/// Options for one encode call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions<'a> {
    /// Strategy name; `Config::default_strategy` when `None`.
    pub strategy: Option<&'a str>,
    /// Record a file hash computed with this algorithm.
    pub hash_algorithm: Option<HashAlgorithm>,
    /// Sign the payload with this passphrase.
    pub passphrase: Option<&'a str>,
    /// Output format name; otherwise chosen from the output extension.
    pub format: Option<&'a str>,
}

/// Options for one decode call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions<'a> {
    pub passphrase: Option<&'a str>,
}

/// Result of a successful encode.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub keymap: Keymap,
    pub format: &'static str,
}

/// Signature state of a decoded keymap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Unsigned,
    Verified,
}

/// Non-fatal findings of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub bytes_written: u64,
    /// Input size recorded in the keymap, if any.
    pub expected_size: Option<u64>,
    pub signature: SignatureCheck,
    pub hash: HashCheck,
}

impl DecodeReport {
    /// Messages to surface next to the written file.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        match &self.hash {
            HashCheck::Mismatch {
                algorithm,
                expected,
                actual,
            } => out.push(format!(
                "file hash mismatch ({algorithm}): keymap records {expected}, reconstructed file is {actual}"
            )),
            HashCheck::Unsupported { algorithm } => out.push(format!(
                "file hash not checked: unsupported algorithm '{algorithm}'"
            )),
            HashCheck::Match { .. } | HashCheck::NotRecorded => {}
        }
        if let Some(expected) = self.expected_size.filter(|&n| n != self.bytes_written) {
            out.push(format!(
                "reconstructed {} bytes but the keymap records an input of {expected} bytes",
                self.bytes_written
            ));
        }
        out
    }
}

/// Bytes rebuilt from a keymap plus what was checked along the way.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub bytes: Vec<u8>,
    pub report: DecodeReport,
}

/// Encode/decode entry points bound to a registry and configuration.
pub struct Pipeline<'r> {
    registry: &'r Registry,
    config: Config,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r Registry, config: Config) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    // -----------------------------------------------------------------------
    // Encode

    /// Build a keymap from everything `reader` yields. `source_name` only
    /// supplies the recorded file name.
    pub fn encode_reader<R: Read>(
        &self,
        reader: R,
        source_name: &Path,
        opts: &EncodeOptions,
    ) -> Result<Keymap> {
        let strategy = self
            .registry
            .strategy(opts.strategy.unwrap_or(self.config.default_strategy.as_str()))?;

        debug!("reading and extracting {}", source_name.display());
        let mut source = IntegrityReader::new(reader, opts.hash_algorithm);
        let runs = BitRuns::with_capacity(self.config.read_buffer_size, &mut source)
            .collect::<Result<Vec<_>>>()?;
        let (size, digest) = source.finish();
        debug!("extracted {} runs from {size} bytes", runs.len());

        debug!("encoding with strategy '{}'", strategy.name());
        let payload = strategy.encode(&runs);

        let signature = match opts.passphrase {
            Some(passphrase) => {
                debug!("signing payload");
                Some(sign_payload(&payload, passphrase)?)
            }
            None => None,
        };

        let mut builder = KeymapBuilder::new(strategy.name(), payload)
            .original_filename(source_name)
            .input_size(size);
        if let (Some(algorithm), Some(digest)) = (opts.hash_algorithm, digest) {
            builder = builder.file_hash(algorithm, digest);
        }
        if let Some(signature) = signature {
            builder = builder.signature(signature);
        }
        Ok(builder.build())
    }

    /// Format for writing to `output`: the named one, else the one owning the
    /// output extension, else the configured default.
    pub fn output_format(&self, output: &Path, name: Option<&str>) -> Result<&'r dyn KeymapFormat> {
        match name {
            Some(name) => self.registry.format(name),
            None => self
                .registry
                .format_for_path(output)
                .or_else(|_| self.registry.format(&self.config.default_format)),
        }
    }

    /// Serialize `keymap` and write it to `output`. On failure `output` is
    /// left untouched.
    pub fn save_keymap(&self, keymap: &Keymap, output: &Path, format: &dyn KeymapFormat) -> Result<()> {
        debug!("serializing keymap as {}", format.name());
        let text = format.serialize(keymap)?;
        write_atomic("writing keymap", output, text.as_bytes()).map_err(HodError::Io)
    }

    pub fn encode_file(&self, input: &Path, output: &Path, opts: &EncodeOptions) -> Result<EncodeReport> {
        self.encode_file_with(input, output, opts, |file, _| file)
    }

    /// [`encode_file`](Self::encode_file) with the opened input passed
    /// through `wrap` first. `wrap` also receives the input length in bytes
    /// (0 when unknown), e.g. for a progress bar.
    pub fn encode_file_with<R, F>(
        &self,
        input: &Path,
        output: &Path,
        opts: &EncodeOptions,
        wrap: F,
    ) -> Result<EncodeReport>
    where
        R: Read,
        F: FnOnce(File, u64) -> R,
    {
        let format = self.output_format(output, opts.format)?;
        let file = open_input(input)?;
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let keymap = self.encode_reader(wrap(file, len), input, opts)?;
        self.save_keymap(&keymap, output, format)?;
        info!(
            "encoded {} ({} bytes) with '{}' into {}",
            input.display(),
            keymap.input_size_bytes.unwrap_or_default(),
            keymap.strategy_name,
            output.display()
        );
        Ok(EncodeReport {
            keymap,
            format: format.name(),
        })
    }

    // -----------------------------------------------------------------------
    // Decode

    /// Read and parse a keymap, choosing the format from the file extension.
    pub fn load_keymap(&self, path: &Path) -> Result<Keymap> {
        let text = fs::read_to_string(path)
            .map_err(|e| HodError::Input(io_error("reading keymap", path, e).to_string()))?;
        let format = self.registry.format_for_path(path)?;
        debug!("deserializing {} as {}", path.display(), format.name());
        format.deserialize(&text)
    }

    /// Check the payload signature. Fails closed: a signed keymap needs the
    /// right passphrase.
    pub fn verify_signature(&self, keymap: &Keymap, passphrase: Option<&str>) -> Result<SignatureCheck> {
        match (keymap.integrity.hmac_signature.as_deref(), passphrase) {
            (Some(signature), Some(passphrase)) => {
                debug!("verifying payload signature");
                if verify_payload(&keymap.payload, signature, passphrase)? {
                    Ok(SignatureCheck::Verified)
                } else {
                    Err(HodError::Integrity(
                        "HMAC signature mismatch: the keymap was modified or the passphrase is wrong"
                            .into(),
                    ))
                }
            }
            (Some(_), None) => Err(HodError::Integrity(
                "keymap is signed; a passphrase is required to decode it".into(),
            )),
            (None, Some(_)) => {
                warn!("keymap is not signed; ignoring the supplied passphrase");
                Ok(SignatureCheck::Unsigned)
            }
            (None, None) => Ok(SignatureCheck::Unsigned),
        }
    }

    /// Rebuild the original bytes in memory.
    pub fn decode_keymap(&self, keymap: &Keymap, passphrase: Option<&str>) -> Result<Reconstruction> {
        let signature = self.verify_signature(keymap, passphrase)?;

        let strategy = self.registry.strategy(&keymap.strategy_name)?;
        debug!("decoding payload with strategy '{}'", strategy.name());
        let runs = strategy.decode(&keymap.payload)?;

        debug!(
            "reconstructing {} runs ({} bits)",
            runs.len(),
            total_bits(&runs).unwrap_or(u64::MAX)
        );
        let bytes = assemble_with_limit(&runs, self.config.max_output_bytes)?;

        let hash = check_hash(
            &bytes,
            keymap.integrity.hash_algorithm.as_deref(),
            keymap.integrity.file_hash.as_deref(),
        );
        let report = DecodeReport {
            bytes_written: bytes.len() as u64,
            expected_size: keymap.input_size_bytes,
            signature,
            hash,
        };
        for warning in report.warnings() {
            warn!("{warning}");
        }
        Ok(Reconstruction { bytes, report })
    }

    pub fn decode_file(&self, input: &Path, output: &Path, opts: &DecodeOptions) -> Result<DecodeReport> {
        let keymap = self.load_keymap(input)?;
        let Reconstruction { bytes, report } = self.decode_keymap(&keymap, opts.passphrase)?;
        write_atomic("writing output file", output, &bytes).map_err(HodError::Io)?;
        info!(
            "decoded {} into {} ({} bytes)",
            input.display(),
            output.display(),
            bytes.len()
        );
        Ok(report)
    }

    /// Payload preview of a keymap file. The signature is still enforced.
    pub fn preview_file(&self, input: &Path, passphrase: Option<&str>) -> Result<String> {
        let keymap = self.load_keymap(input)?;
        self.verify_signature(&keymap, passphrase)?;
        Ok(render_payload(
            &keymap.strategy_name,
            &keymap.payload,
            self.config.preview_limit,
        ))
    }
}

pub fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| HodError::Input(io_error("opening input file", path, e).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::hash_bytes;
    use serde_json::json;

    fn pipeline() -> Pipeline<'static> {
        Pipeline::new(Registry::builtin(), Config::default())
    }

    fn encode(data: &[u8], opts: EncodeOptions) -> Keymap {
        pipeline()
            .encode_reader(data, Path::new("dir/in.bin"), &opts)
            .unwrap()
    }

    #[test]
    fn scenario_single_ff_byte() {
        for (strategy, expected) in [
            ("rle", json!([["1", 8]])),
            ("fibonacci", json!([["1", [8]]])),
            ("power", json!(["1^8"])),
        ] {
            let km = encode(
                &[0xFF],
                EncodeOptions {
                    strategy: Some(strategy),
                    ..Default::default()
                },
            );
            assert_eq!(km.payload, expected);
            assert_eq!(km.strategy_name, strategy);
            assert_eq!(km.original_filename, "in.bin");
            assert_eq!(km.input_size_bytes, Some(1));
        }
    }

    #[test]
    fn default_strategy_and_no_integrity() {
        let km = encode(b"abc", EncodeOptions::default());
        assert_eq!(km.strategy_name, "rle");
        assert_eq!(km.integrity, Default::default());
    }

    #[test]
    fn hash_recorded_and_matched() {
        let data = b"integrity".to_vec();
        let km = encode(
            &data,
            EncodeOptions {
                hash_algorithm: Some(HashAlgorithm::Sha512),
                ..Default::default()
            },
        );
        assert_eq!(km.integrity.hash_algorithm.as_deref(), Some("sha512"));
        assert_eq!(
            km.integrity.file_hash.as_deref(),
            Some(hash_bytes(&data, HashAlgorithm::Sha512).as_str())
        );
        let rec = pipeline().decode_keymap(&km, None).unwrap();
        assert_eq!(rec.bytes, data);
        assert_eq!(rec.report.hash, HashCheck::Match { algorithm: HashAlgorithm::Sha512 });
        assert!(rec.report.warnings().is_empty());
    }

    #[test]
    fn corrupted_hash_is_only_a_warning() {
        let mut km = encode(
            b"data",
            EncodeOptions {
                hash_algorithm: Some(HashAlgorithm::Sha256),
                ..Default::default()
            },
        );
        km.integrity.file_hash = Some("00".repeat(32));
        let rec = pipeline().decode_keymap(&km, None).unwrap();
        assert_eq!(rec.bytes, b"data");
        assert!(rec.report.hash.is_mismatch());
        assert_eq!(rec.report.warnings().len(), 1);
    }

    #[test]
    fn signed_keymap_requires_matching_passphrase() {
        let km = encode(
            b"secret",
            EncodeOptions {
                strategy: Some("power"),
                passphrase: Some("pw"),
                ..Default::default()
            },
        );
        assert!(km.is_signed());
        let p = pipeline();
        assert_eq!(
            p.decode_keymap(&km, Some("pw")).unwrap().report.signature,
            SignatureCheck::Verified
        );
        assert!(matches!(p.decode_keymap(&km, Some("nope")), Err(HodError::Integrity(_))));
        assert!(matches!(p.decode_keymap(&km, None), Err(HodError::Integrity(_))));
    }

    #[test]
    fn tampered_payload_fails_before_strategy_decode() {
        let mut km = encode(
            b"x",
            EncodeOptions {
                strategy: Some("power"),
                passphrase: Some("pw"),
                ..Default::default()
            },
        );
        km.payload = json!(["not a token"]);
        assert!(matches!(
            pipeline().decode_keymap(&km, Some("pw")),
            Err(HodError::Integrity(_))
        ));
    }

    #[test]
    fn unknown_strategy() {
        let mut km = encode(b"x", EncodeOptions::default());
        km.strategy_name = "unknown".into();
        assert!(matches!(pipeline().decode_keymap(&km, None), Err(HodError::Strategy(_))));
        let err = pipeline()
            .encode_reader(&b"x"[..], Path::new("x"), &EncodeOptions {
                strategy: Some("unknown"),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, HodError::Strategy(_)));
    }

    #[test]
    fn output_limit_is_enforced() {
        let km = encode(&[0u8; 64], EncodeOptions::default());
        let config = Config {
            max_output_bytes: 63,
            ..Config::default()
        };
        let p = Pipeline::new(Registry::builtin(), config);
        assert!(matches!(p.decode_keymap(&km, None), Err(HodError::Reconstruction(_))));
    }

    #[test]
    fn output_format_resolution() {
        let p = pipeline();
        assert_eq!(p.output_format(Path::new("a.conf"), None).unwrap().name(), "conf");
        assert_eq!(p.output_format(Path::new("a.txt"), None).unwrap().name(), "json");
        assert_eq!(p.output_format(Path::new("a.hod"), Some("conf")).unwrap().name(), "conf");
        assert!(p.output_format(Path::new("a.hod"), Some("yaml")).is_err());
    }

    #[test]
    fn unrecorded_size_is_not_a_mismatch() {
        let doc = json!({"strategy": "rle", "payload": [["1", 8]]});
        let km = Keymap::from_document(doc).unwrap();
        let rec = pipeline().decode_keymap(&km, None).unwrap();
        assert_eq!(rec.report.expected_size, None);
        assert!(rec.report.warnings().is_empty());

        let mut km = km;
        km.input_size_bytes = Some(2);
        let rec = pipeline().decode_keymap(&km, None).unwrap();
        assert_eq!(rec.report.warnings().len(), 1);
    }

    #[test]
    fn failed_keymap_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        fs::write(&input, b"abc").unwrap();
        // An existing directory cannot be replaced by the keymap.
        let output = dir.path().join("taken.hod");
        fs::create_dir(&output).unwrap();

        let err = pipeline()
            .encode_file(&input, &output, &EncodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, HodError::Io(_)));
        assert!(output.is_dir());
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
    }

    #[test]
    fn encode_file_with_sees_input_length() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.hod");
        fs::write(&input, [0u8; 5]).unwrap();

        let mut seen = None;
        let report = pipeline()
            .encode_file_with(&input, &output, &EncodeOptions::default(), |file, len| {
                seen = Some(len);
                file
            })
            .unwrap();
        assert_eq!(seen, Some(5));
        assert_eq!(report.keymap.input_size_bytes, Some(5));
        assert!(output.is_file());
    }
}
