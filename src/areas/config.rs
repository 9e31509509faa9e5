//! Repository configuration
//!
//! Stored as JSON in `.knot/config.json`. Every field is optional; a missing
//! file is the default configuration. Environment variables take precedence
//! over the file:
//!
//! - `KNOT_REMOTE`: path of the remote store
//! - `KNOT_AUTHOR_NAME` / `KNOT_AUTHOR_EMAIL`: commit author
//! - `KNOT_AUTHOR_DATE`: commit timestamp (`%Y-%m-%d %H:%M:%S %z` or RFC 2822)

use crate::artifacts::objects::commit::Author;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

const REMOTE_ENV: &str = "KNOT_REMOTE";
const AUTHOR_NAME_ENV: &str = "KNOT_AUTHOR_NAME";
const AUTHOR_EMAIL_ENV: &str = "KNOT_AUTHOR_EMAIL";
const AUTHOR_DATE_ENV: &str = "KNOT_AUTHOR_DATE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory of the remote object store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorConfig>,
}

impl Config {
    /// Load the configuration from a repository directory
    pub fn load(repository_dir: &Path) -> anyhow::Result<Self> {
        let config_path = repository_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {:?}", config_path))
    }

    /// Save the configuration to a repository directory
    pub fn save(&self, repository_dir: &Path) -> anyhow::Result<()> {
        let config_path = repository_dir.join(CONFIG_FILE);
        let temp_path = config_path.with_extension("tmp");

        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(&temp_path, &data)
            .with_context(|| format!("Failed to write config to {:?}", temp_path))?;
        std::fs::rename(&temp_path, &config_path)
            .with_context(|| format!("Failed to replace config {:?}", config_path))?;

        Ok(())
    }

    /// Remote store location, `KNOT_REMOTE` first
    pub fn remote(&self) -> Option<PathBuf> {
        std::env::var_os(REMOTE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.remote.clone())
    }

    /// Signature for a new commit
    pub fn author(&self) -> anyhow::Result<Author> {
        let configured = self.author.clone().unwrap_or_default();

        let name = env_or(AUTHOR_NAME_ENV, configured.name)
            .with_context(|| format!("author name not configured (set {})", AUTHOR_NAME_ENV))?;
        let email = env_or(AUTHOR_EMAIL_ENV, configured.email)
            .with_context(|| format!("author email not configured (set {})", AUTHOR_EMAIL_ENV))?;

        match std::env::var(AUTHOR_DATE_ENV) {
            Ok(date) if !date.trim().is_empty() => Ok(Author::new_with_timestamp(
                name,
                email,
                Author::parse_date(date.trim())?,
            )),
            _ => Ok(Author::new(name, email)),
        }
    }
}

fn env_or(key: &str, fallback: Option<String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or(fallback)
}
