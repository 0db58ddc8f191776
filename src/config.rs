//! Configuration loading for skip rules.
//!
//! The effective [`IgnoreRules`] are the built-in defaults (compiled in from
//! `rules/ignore_rules.json`) merged with an optional user file. User lists
//! always extend the built-in lists; they never replace them, so defaults such
//! as `.git` stay ignored no matter what the user file says. Booleans present in
//! the user file override the built-in value.
//!
//! Loading never fails. A malformed user file is moved aside to a timestamped
//! `.bak` file and a fresh copy of the defaults is written in its place.
//!
//! # User file format
//!
//! ```json
//! {
//!   "enabled": true,
//!   "ignore_dirs": true,
//!   "hidden": true,
//!   "names": ["thumbs.db"],
//!   "suffixes": [".part"],
//!   "globs": ["~$*"],
//!   "allow_names": [".gitkeep"]
//! }
//! ```

use crate::executor::unique_target;
use crate::ignore_rules::IgnoreRules;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_IGNORE_RULES: &str = include_str!("../rules/ignore_rules.json");

/// Environment variable overriding the per-user configuration directory.
pub const CONFIG_DIR_ENV: &str = "SORTODOCO_CONFIG_DIR";

/// File name of the user ignore rules inside the configuration directory.
pub const IGNORE_RULES_FILE: &str = "ignore_rules.json";

/// Errors raised while loading category rules or other configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("IO error reading configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid JSON/TOML syntax or structure.
    #[error("Invalid configuration in {origin}: {reason}")]
    Parse { origin: String, reason: String },

    /// The same extension is listed under two different categories.
    #[error(
        "Extension '{extension}' already mapped to '{existing}', also found in '{conflicting}'"
    )]
    ExtensionConflict {
        extension: String,
        existing: String,
        conflicting: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Returns the per-user configuration directory.
///
/// `$SORTODOCO_CONFIG_DIR` wins when set; otherwise the platform config
/// directory (e.g. `~/.config/sortodoco` on Linux) is used.
pub fn default_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|dir| dir.join("sortodoco"))
}

/// On-disk shape of an ignore rules file.
///
/// Every key is optional. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRulesFile {
    pub enabled: Option<bool>,
    pub ignore_dirs: Option<bool>,
    pub hidden: Option<bool>,
    pub names: Vec<String>,
    pub suffixes: Vec<String>,
    pub globs: Vec<String>,
    pub allow_names: Vec<String>,
}

impl IgnoreRulesFile {
    /// Parses rules from JSON text.
    pub fn from_json_str(text: &str, origin: &str) -> ConfigResult<Self> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            reason: e.to_string(),
        })
    }

    fn read(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let origin = path.display().to_string();
        let text = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
            origin: origin.clone(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text, &origin)
    }

    fn builtin() -> Self {
        Self::from_json_str(BUILTIN_IGNORE_RULES, "<built-in>").unwrap_or_else(|e| {
            log::error!("Built-in ignore rules are unreadable: {}", e);
            Self::default()
        })
    }

    /// Merges `overrides` on top of `self`: lists are unioned, booleans
    /// present in `overrides` win.
    fn merge(self, overrides: Self) -> IgnoreRules {
        let base = IgnoreRules::default();
        IgnoreRules::builder()
            .enabled(overrides.enabled.or(self.enabled).unwrap_or(base.enabled()))
            .ignore_dirs(
                overrides
                    .ignore_dirs
                    .or(self.ignore_dirs)
                    .unwrap_or(base.ignore_dirs()),
            )
            .hidden(overrides.hidden.or(self.hidden).unwrap_or(base.hidden()))
            .names(self.names.iter().chain(&overrides.names))
            .suffixes(self.suffixes.iter().chain(&overrides.suffixes))
            .globs(self.globs.iter().chain(&overrides.globs))
            .allow_names(self.allow_names.iter().chain(&overrides.allow_names))
            .build()
    }
}

/// Returns the built-in ignore rules without consulting any user file.
pub fn builtin_ignore_rules() -> IgnoreRules {
    IgnoreRulesFile::builtin().merge(IgnoreRulesFile::default())
}

/// How the effective rules were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesLoadStatus {
    /// The user file did not exist and was created from the defaults.
    Seeded,
    /// An existing, valid rules file was merged with the defaults.
    Present,
    /// The user file was malformed; it was backed up and reset to defaults.
    Recovered,
    /// Only built-in defaults were used (no usable file).
    Defaults,
}

/// Loads effective ignore rules from built-ins plus a user or explicit file.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRulesLoader {
    config_dir: Option<PathBuf>,
    explicit_file: Option<PathBuf>,
}

impl IgnoreRulesLoader {
    /// Loader using [`default_config_dir`].
    pub fn from_env() -> Self {
        Self {
            config_dir: default_config_dir(),
            explicit_file: None,
        }
    }

    /// Loader rooted at a specific configuration directory.
    pub fn with_config_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: Some(dir.into()),
            explicit_file: None,
        }
    }

    /// Uses `path` instead of the user file. An explicit file is never
    /// seeded, backed up or rewritten.
    pub fn explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    pub fn user_rules_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join(IGNORE_RULES_FILE))
    }

    /// Creates the user rules file from the built-in defaults if missing.
    pub fn ensure_user_rules_exist(&self) -> RulesLoadStatus {
        let Some(path) = self.user_rules_path() else {
            return RulesLoadStatus::Defaults;
        };
        if path.exists() {
            return RulesLoadStatus::Present;
        }
        match write_defaults(&path) {
            Ok(()) => {
                log::info!("Seeded ignore rules at {}", path.display());
                RulesLoadStatus::Seeded
            }
            Err(e) => {
                log::warn!("Could not seed ignore rules at {}: {}", path.display(), e);
                RulesLoadStatus::Defaults
            }
        }
    }

    /// Returns the effective rules. Never fails.
    pub fn load(&self) -> IgnoreRules {
        self.load_with_status().0
    }

    /// Returns the effective rules together with how they were obtained.
    pub fn load_with_status(&self) -> (IgnoreRules, RulesLoadStatus) {
        let builtin = IgnoreRulesFile::builtin();

        if let Some(path) = &self.explicit_file {
            return match IgnoreRulesFile::read(path) {
                Ok(user) => (builtin.merge(user), RulesLoadStatus::Present),
                Err(e) => {
                    log::warn!("Ignoring ignore rules file: {}", e);
                    (builtin.merge(IgnoreRulesFile::default()), RulesLoadStatus::Defaults)
                }
            };
        }

        let status = self.ensure_user_rules_exist();
        let Some(path) = self.user_rules_path() else {
            return (builtin.merge(IgnoreRulesFile::default()), status);
        };
        if status == RulesLoadStatus::Defaults {
            return (builtin.merge(IgnoreRulesFile::default()), status);
        }

        match IgnoreRulesFile::read(&path) {
            Ok(user) => (builtin.merge(user), status),
            Err(ConfigError::Parse { reason, .. }) => {
                log::warn!(
                    "Malformed ignore rules at {}: {}. Resetting to defaults.",
                    path.display(),
                    reason
                );
                let status = match quarantine(&path) {
                    Ok(backup) => {
                        log::warn!("Backed up malformed rules to {}", backup.display());
                        RulesLoadStatus::Recovered
                    }
                    Err(e) => {
                        log::warn!("Could not reset {}: {}", path.display(), e);
                        RulesLoadStatus::Defaults
                    }
                };
                (builtin.merge(IgnoreRulesFile::default()), status)
            }
            Err(e) => {
                log::warn!("Could not read ignore rules: {}", e);
                (
                    builtin.merge(IgnoreRulesFile::default()),
                    RulesLoadStatus::Defaults,
                )
            }
        }
    }
}

fn write_defaults(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, BUILTIN_IGNORE_RULES)
}

/// Moves a malformed rules file to `<stem>.<timestamp>.bak` and rewrites
/// the defaults. Returns the backup path.
fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "ignore_rules".to_string());
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let backup = unique_target(&path.with_file_name(format!("{}.{}.bak", stem, timestamp)));

    fs::rename(path, &backup)?;
    write_defaults(path)?;
    Ok(backup)
}
