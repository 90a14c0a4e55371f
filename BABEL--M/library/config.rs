use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;

use crate::coherence::COHERENT_THRESHOLD;
use crate::generator::SeedWindow;

/// Engine settings loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Default minimum composite for search results.
    #[serde(default = "default_min_coherence")]
    pub min_coherence: f64,
    /// Whether generated pages are cached.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Pages per assembled book.
    #[serde(default = "default_book_size")]
    pub default_book_size: usize,
    /// Seed offsets for the exact strategy, `[start, end)`.
    #[serde(default = "default_exact_window")]
    pub exact_seed_window: [u64; 2],
    /// Raw seeds for the inversion strategy, `[start, end)`.
    #[serde(default = "default_inversion_window")]
    pub inversion_seed_window: [u64; 2],
    /// Composite at which decoded pages count as coherent.
    #[serde(default = "default_coherent_threshold")]
    pub coherent_threshold: f64,
    /// JSON-lines log destination; no file logging when absent.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Minimum level written to the log.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_coherence: default_min_coherence(),
            cache_enabled: true,
            default_book_size: default_book_size(),
            exact_seed_window: default_exact_window(),
            inversion_seed_window: default_inversion_window(),
            coherent_threshold: default_coherent_threshold(),
            log_path: None,
            log_level: default_log_level(),
        }
    }
}

impl DiscoveryConfig {
    /// Loads and validates a TOML file; relative log paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading discovery config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        if let Some(log_path) = config.log_path.as_mut() {
            if log_path.is_relative() {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                *log_path = base.join(&*log_path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks windows, thresholds, book size, and log level.
    pub fn validate(&self) -> Result<()> {
        for (name, [start, end]) in [
            ("exact_seed_window", self.exact_seed_window),
            ("inversion_seed_window", self.inversion_seed_window),
        ] {
            if start >= end {
                bail!("invalid {name}: start {start} must be below end {end}");
            }
        }
        for (name, value) in [
            ("min_coherence", self.min_coherence),
            ("coherent_threshold", self.coherent_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                bail!("{name} must lie in [0, 100], got {value}");
            }
        }
        if self.default_book_size == 0 {
            bail!("default_book_size must be positive");
        }
        self.level()?;
        Ok(())
    }

    /// Parsed log level.
    pub fn level(&self) -> Result<LogLevel> {
        self.log_level
            .parse()
            .with_context(|| format!("invalid log_level {:?}", self.log_level))
    }

    /// Window used by the exact strategy.
    #[must_use]
    pub const fn exact_window(&self) -> SeedWindow {
        SeedWindow::new(self.exact_seed_window[0], self.exact_seed_window[1])
    }

    /// Window used by the inversion strategy.
    #[must_use]
    pub const fn inversion_window(&self) -> SeedWindow {
        SeedWindow::new(self.inversion_seed_window[0], self.inversion_seed_window[1])
    }
}

const fn default_true() -> bool {
    true
}

const fn default_min_coherence() -> f64 {
    30.0
}

const fn default_book_size() -> usize {
    crate::assembler::DEFAULT_BOOK_SIZE
}

const fn default_exact_window() -> [u64; 2] {
    [SeedWindow::SUBSTRING_DEFAULT.start, SeedWindow::SUBSTRING_DEFAULT.end]
}

const fn default_inversion_window() -> [u64; 2] {
    [SeedWindow::INVERSION_DEFAULT.start, SeedWindow::INVERSION_DEFAULT.end]
}

const fn default_coherent_threshold() -> f64 {
    COHERENT_THRESHOLD
}

fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("discovery.toml");
        fs::write(&path, "").unwrap();
        let config = DiscoveryConfig::load(&path).unwrap();
        assert_eq!(config, DiscoveryConfig::default());
        assert_eq!(config.exact_window(), SeedWindow::new(0, 1_000_000));
        assert_eq!(config.inversion_window(), SeedWindow::new(0, 5_000));
        assert_eq!(config.level().unwrap(), LogLevel::Info);
    }

    #[test]
    fn overrides_and_relative_log_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("discovery.toml");
        fs::write(
            &path,
            r#"
min_coherence = 45.0
cache_enabled = false
default_book_size = 8
inversion_seed_window = [100, 900]
log_path = "logs/babel.jsonl"
log_level = "warn"
"#,
        )
        .unwrap();
        let config = DiscoveryConfig::load(&path).unwrap();
        assert!(!config.cache_enabled);
        assert_eq!(config.default_book_size, 8);
        assert_eq!(config.inversion_window(), SeedWindow::new(100, 900));
        assert_eq!(config.log_path, Some(dir.path().join("logs/babel.jsonl")));
        assert_eq!(config.level().unwrap(), LogLevel::Warn);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        for body in [
            "exact_seed_window = [10, 10]",
            "min_coherence = 120.0",
            "default_book_size = 0",
            "log_level = \"loud\"",
        ] {
            fs::write(&path, body).unwrap();
            assert!(DiscoveryConfig::load(&path).is_err(), "{body} should fail");
        }
        assert!(DiscoveryConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
