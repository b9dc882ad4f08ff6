//! Settings file.
//!
//! ```toml
//! [source]
//! path = "data.csv"
//! encoding = "latin1"
//!
//! [schema]
//! factor_prefix = "Fakor Perceraian"
//!
//! [report]
//! top_k = 3
//! ```
//!
//! Every section and field is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::{Encoding, LoadOptions};
use crate::data::schema::SchemaConfig;
use crate::report::ReportSettings;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub schema: SchemaConfig,
    pub report: ReportSettings,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        if config.report.top_k == 0 {
            anyhow::bail!("report.top_k must be at least 1");
        }
        Ok(config)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            encoding: self.source.encoding,
            schema: self.schema.clone(),
        }
    }
}
