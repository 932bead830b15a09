//! Config loading.
use super::error::{Result, RevisionError};
use super::impact::ImpactPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub impact: ImpactPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("revisions.db"),
            impact: ImpactPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| config_error(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| config_error(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.impact.high_change_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(config_error(format!(
                "impact.high_change_ratio must be a non-negative number, got {ratio}"
            )));
        }
        Ok(())
    }
}

fn config_error(reason: String) -> RevisionError {
    RevisionError::Config(reason)
}
