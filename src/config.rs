//! Configuration loading. A missing config file is not an error: every key
//! has a default so a fresh install starts with no setup. A file that exists
//! but does not parse is reported, since silently ignoring it would hide typos.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;

use crate::editor::gesture::DEFAULT_DRAG_THRESHOLD;
use crate::models::User;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CHORDBOOK_CONFIG";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DATABASE_FILE: &str = "chordbook.sqlite";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_USER_ID: &str = "local";
const DEFAULT_USER_EMAIL: &str = "local@localhost";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the database and log file. Defaults to the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
    pub database_file: String,
    pub log_level: String,
    /// Pointer travel, in terminal cells, before a press on a chord counts
    /// as a drag instead of a click.
    pub drag_threshold: f64,
    pub user: UserConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            user: UserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Set to false to browse public songs without an identity.
    pub signed_in: bool,
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            signed_in: true,
            id: DEFAULT_USER_ID.to_string(),
            email: DEFAULT_USER_EMAIL.to_string(),
            display_name: None,
        }
    }
}

impl Config {
    /// Load from `CHORDBOOK_CONFIG` if set, otherwise from the platform
    /// config directory.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).context("failed to parse TOML")?;
        if !config.drag_threshold.is_finite() || config.drag_threshold < 0.0 {
            return Err(anyhow!("drag_threshold must be a non-negative number"));
        }
        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| anyhow!("could not locate a data directory"))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(&self.database_file))
    }

    /// The configured user, unless the config opts out of signing in.
    pub fn user(&self) -> Option<User> {
        if !self.user.signed_in || self.user.id.trim().is_empty() {
            return None;
        }
        Some(User {
            id: self.user.id.trim().to_string(),
            email: self.user.email.trim().to_string(),
            display_name: self
                .user
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        })
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "chordbook")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("absent.toml")).expect("config");
        assert_eq!(config, Config::default());
        assert_eq!(config.drag_threshold, 3.0);
        assert_eq!(config.user().expect("user").id, "local");
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "data_dir = \"/tmp/chords\"\nlog_level = \"debug\"\n\n[user]\nid = \"ana\"\nemail = \"ana@example.com\"\ndisplay_name = \"  \""
        )
        .expect("write");

        let config = Config::load_from(file.path()).expect("config");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.database_file, DEFAULT_DATABASE_FILE);
        assert_eq!(
            config.database_path().expect("path"),
            PathBuf::from("/tmp/chords").join(DEFAULT_DATABASE_FILE)
        );
        let user = config.user().expect("user");
        assert_eq!(user.id, "ana");
        assert_eq!(user.display_name, None);
    }

    #[test]
    fn signed_out_config_has_no_user() {
        let config = Config::parse("[user]\nsigned_in = false").expect("config");
        assert!(config.user().is_none());
    }

    #[test]
    fn malformed_files_are_errors() {
        assert!(Config::parse("log_level = [").is_err());
        assert!(Config::parse("drag_threshold = -1.0").is_err());
    }
}
