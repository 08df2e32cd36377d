//! Per-view grid settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::pagination::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Initial page size when nothing is persisted
    pub page_size: usize,
    /// Page size choices offered to the user
    pub page_sizes: Vec<usize>,
    /// Delay before filter edits propagate to the descriptor
    pub debounce_ms: u64,
    /// How long a fetched page is served from cache
    pub stale_time_secs: u64,
    /// Estimated row height used until rows are measured
    pub row_height: f32,
    /// Rows rendered beyond each viewport edge
    pub overscan: usize,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_sizes: vec![10, 25, 50, 100, 500],
            debounce_ms: 300,
            stale_time_secs: 600,
            row_height: 36.0,
            overscan: 5,
        }
    }
}

impl GridSettings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse grid settings")
    }

    /// Load settings from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read grid settings from {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace out-of-range values with their defaults
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.page_size == 0 {
            tracing::warn!("page_size must be positive, using {}", defaults.page_size);
            self.page_size = defaults.page_size;
        }
        self.page_sizes.retain(|size| *size > 0);
        if self.page_sizes.is_empty() {
            self.page_sizes = defaults.page_sizes;
        }
        if !self.row_height.is_finite() || self.row_height <= 0.0 {
            tracing::warn!(
                row_height = self.row_height,
                "row_height must be positive, using {}",
                defaults.row_height
            );
            self.row_height = defaults.row_height;
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = GridSettings::from_toml_str("page_size = 25\noverscan = 2\n").unwrap();
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.overscan, 2);
        assert_eq!(settings.debounce_ms, 300);
        assert_eq!(settings.stale_time(), Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(GridSettings::from_toml_str("page_size = \"many\"").is_err());
    }

    #[test]
    fn test_validated_normalizes() {
        let settings = GridSettings {
            page_size: 0,
            page_sizes: vec![0],
            row_height: -4.0,
            ..GridSettings::default()
        }
        .validated();

        assert_eq!(settings, GridSettings::default());
    }

    #[test]
    fn test_load_missing_file_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("grid.toml");
        assert_eq!(GridSettings::load(&path).unwrap(), GridSettings::default());

        let settings = GridSettings {
            page_size: 50,
            debounce_ms: 150,
            ..GridSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(GridSettings::load(&path).unwrap(), settings);
    }
}
