//! Lossless symbolic re-encoding of files.
//!
//! A file's bits are split into maximal runs, the runs are re-expressed by a
//! named [`Strategy`](strategy::Strategy) (plain run lengths, Zeckendorf
//! addends or `bit^count` tokens) and the result is stored in a [`Keymap`]
//! together with an optional content hash and an optional HMAC signature.
//! Decoding reverses every step and reproduces the original bytes exactly.
//!
//! ```
//! use std::path::Path;
//! use hod::{Config, EncodeOptions, Pipeline, Registry};
//!
//! let pipeline = Pipeline::new(Registry::builtin(), Config::default());
//! let opts = EncodeOptions { strategy: Some("power"), ..Default::default() };
//! let keymap = pipeline.encode_reader(&[0xFFu8][..], Path::new("one.bin"), &opts).unwrap();
//! assert_eq!(keymap.payload, serde_json::json!(["1^8"]));
//!
//! let rebuilt = pipeline.decode_keymap(&keymap, None).unwrap();
//! assert_eq!(rebuilt.bytes, vec![0xFF]);
//! ```

pub mod bits;
pub mod config;
pub mod display;
pub mod error;
pub mod format;
pub mod integrity;
pub mod io_utils;
pub mod keymap;
pub mod pipeline;
pub mod registry;
pub mod strategy;

pub use bits::{assemble, assemble_with_limit, extract, extract_bytes, Bit, BitRun, BitRuns};
pub use config::Config;
pub use error::{HodError, Result};
pub use format::KeymapFormat;
pub use integrity::{hash_bytes, hash_file, sign_payload, verify_payload, HashAlgorithm, HashCheck};
pub use keymap::{IntegrityBlock, Keymap, KeymapBuilder};
pub use pipeline::{DecodeOptions, DecodeReport, EncodeOptions, EncodeReport, Pipeline, SignatureCheck};
pub use registry::Registry;
pub use strategy::{Payload, Strategy};
