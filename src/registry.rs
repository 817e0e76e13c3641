//! Name-keyed lookup of strategies and formats.
//!
//! A [`Registry`] is built once and never mutated afterwards. Callers either
//! construct their own with [`Registry::with`] and pass it around, or share
//! the lazily initialised [`Registry::builtin`] instance.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::format::{self, KeymapFormat};
use crate::strategy::{self, Strategy};
use crate::{HodError, Result};

pub struct Registry {
    strategies: BTreeMap<&'static str, Box<dyn Strategy>>,
    formats: BTreeMap<&'static str, Box<dyn KeymapFormat>>,
    by_extension: BTreeMap<&'static str, &'static str>,
}

impl Registry {
    /// Registry holding every built-in strategy and format.
    pub fn new() -> Self {
        Self::with(strategy::builtin(), format::builtin())
    }

    /// Registry over an explicit set of implementations. A later entry with
    /// an already registered name replaces the earlier one.
    pub fn with(
        strategies: Vec<Box<dyn Strategy>>,
        formats: Vec<Box<dyn KeymapFormat>>,
    ) -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
            formats: BTreeMap::new(),
            by_extension: BTreeMap::new(),
        };
        for s in strategies {
            if registry.strategies.insert(s.name(), s).is_some() {
                log::warn!("duplicate strategy registration replaced an earlier one");
            }
        }
        for f in formats {
            registry.by_extension.insert(f.extension(), f.name());
            if registry.formats.insert(f.name(), f).is_some() {
                log::warn!("duplicate format registration replaced an earlier one");
            }
        }
        registry
    }

    /// Process-wide registry, initialised on first use.
    pub fn builtin() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(Registry::new)
    }

    pub fn strategy(&self, name: &str) -> Result<&dyn Strategy> {
        self.strategies
            .get(name)
            .map(|s| s.as_ref())
            .ok_or_else(|| {
                HodError::Strategy(format!(
                    "unknown strategy '{name}'. Available: {}",
                    self.strategy_names().join(", ")
                ))
            })
    }

    /// Registered strategy names, sorted.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }

    pub fn format(&self, name: &str) -> Result<&dyn KeymapFormat> {
        self.formats
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| {
                let names: Vec<_> = self.formats.keys().copied().collect();
                HodError::Format(format!(
                    "unknown format '{name}'. Available: {}",
                    names.join(", ")
                ))
            })
    }

    /// Format registered for the extension of `path` (case-insensitive).
    pub fn format_for_path(&self, path: &Path) -> Result<&dyn KeymapFormat> {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()));
        ext.as_deref()
            .and_then(|e| self.by_extension.get(e))
            .and_then(|name| self.formats.get(name))
            .map(|f| f.as_ref())
            .ok_or_else(|| {
                let known: Vec<_> = self.by_extension.keys().copied().collect();
                HodError::Format(format!(
                    "no keymap format for '{}'. Known extensions: {}",
                    path.display(),
                    known.join(", ")
                ))
            })
    }

    /// Registered formats, sorted by name.
    pub fn formats(&self) -> impl Iterator<Item = &dyn KeymapFormat> {
        self.formats.values().map(|f| f.as_ref())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
