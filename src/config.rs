use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audit::Auditor;
use crate::encoder::DEFAULT_TARGET;

/// Top-level configuration for the genmeta library and CLI.
///
/// Controls where the moderation wordlist comes from, which encoder target
/// re-encoding uses, and how images are rewritten.
///
/// # Loading
///
/// ```rust,no_run
/// use genmeta::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.audit.wordlist_path = Some("blocklist.json".into());
/// config.output.backup_originals = false;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Moderation wordlist settings.
    pub audit: AuditConfig,
    /// Re-encoding settings.
    pub encoder: EncoderConfig,
    /// Output behavior (dry run, backups).
    pub output: OutputConfig,
}

/// Moderation wordlist settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// If `false`, every record passes the audit.
    pub enabled: bool,
    /// Path to a JSON array of blocked words. `None` uses the built-in list.
    pub wordlist_path: Option<String>,
}

/// Re-encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder target name (see [`crate::encoder::targets`]).
    pub target: String,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, report what would be rewritten without modifying any files.
    pub dry_run: bool,
    /// If `true`, create a `.bak` backup before rewriting an image.
    pub backup_originals: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wordlist_path: None,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_originals: true,
        }
    }
}

impl AuditConfig {
    /// Build the auditor this configuration describes.
    ///
    /// A disabled audit gets an empty wordlist, so every record passes.
    pub fn build_auditor(&self) -> Result<Auditor> {
        if !self.enabled {
            log::info!("Audit disabled by configuration");
            return Ok(Auditor::new(Vec::<String>::new())?);
        }

        match &self.wordlist_path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read wordlist {path}"))?;
                let auditor = Auditor::from_json(&contents)
                    .with_context(|| format!("Invalid wordlist {path}"))?;
                Ok(auditor)
            }
            None => Ok(Auditor::with_default_wordlist()?),
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
