//! Optional `config.json` in the OS config directory.
//!
//! Every field has a serde default so a partial file (or none at all) works.
//! Command-line flags override whatever is loaded here.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CliError;

fn default_base_url() -> String {
    "https://mlviz.example.org".to_string()
}

fn default_svg_width() -> f64 {
    640.0
}

fn default_svg_height() -> f64 {
    480.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Fixed seed; unset means clock-seeded.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Tick delay; unset means the lesson's default.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_svg_width")]
    pub svg_width: f64,
    #[serde(default = "default_svg_height")]
    pub svg_height: f64,
    /// Per-lesson parameter overrides: `{"kmeans": {"k": 4}}`.
    #[serde(default)]
    pub params: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            seed: None,
            delay_ms: None,
            base_url: default_base_url(),
            svg_width: default_svg_width(),
            svg_height: default_svg_height(),
            params: BTreeMap::new(),
        }
    }
}

impl CliConfig {
    /// Load `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Overrides for one lesson, in key order.
    pub fn lesson_params(&self, lesson: &str) -> impl Iterator<Item = (&str, f64)> {
        self.params
            .get(lesson)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}
