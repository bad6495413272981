//! Configuration loading
//!
//! Resolution order, later entries winning:
//! - Built-in defaults
//! - YAML file (`--config`, `./note-assets.yml`, or `<config dir>/note-assets/config.yml`)
//! - Environment variables (NOTE_ASSETS_NOTES_ROOT, NOTE_ASSETS_ASSETS_ROOT)
//! - Command line flags (applied by the caller through [`Config::with_roots`])

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::constants as C;
use crate::error::{Error, Result};
use crate::util;

static ZONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^UTC([+-])(\d+(?:\.\d+)?)$").expect("valid zone pattern"));

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the notes
    pub notes_root: PathBuf,
    /// Directory mirroring the notes tree with per-note asset directories
    pub assets_root: PathBuf,
    /// Dotted extensions recognised as notes
    pub supported_extensions: BTreeSet<String>,
    /// Exact file names that are never notes
    pub exclude_patterns: BTreeSet<String>,
    /// Directory names never scanned
    pub exclude_dirs: BTreeSet<String>,
    /// Template used by `new`
    pub notes_template: PathBuf,
    /// strftime format for `{{date}}`
    pub date_format: String,
    /// Zone for `{{date}}`, written `UTC+8`, `UTC-5`, `UTC+5.5`
    pub timestamp_zone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_root: PathBuf::from(C::DEFAULT_NOTES_ROOT),
            assets_root: PathBuf::from(C::DEFAULT_ASSETS_ROOT),
            supported_extensions: C::DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: C::DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: C::DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            notes_template: PathBuf::from(C::DEFAULT_TEMPLATE_PATH),
            date_format: C::DEFAULT_DATE_FORMAT.to_string(),
            timestamp_zone: C::DEFAULT_TIMESTAMP_ZONE.to_string(),
        }
    }
}

impl Config {
    /// Config rooted at explicit notes and assets directories, other values default
    pub fn new(notes_root: impl Into<PathBuf>, assets_root: impl Into<PathBuf>) -> Self {
        Self {
            notes_root: notes_root.into(),
            assets_root: assets_root.into(),
            ..Self::default()
        }
    }

    /// Load configuration following the documented resolution order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover() {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.to_path_buf())
            } else {
                Error::io("read config", path, e)
            }
        })?;
        debug!("Loading config from {}", path.display());
        Self::from_yaml(&content)
    }

    /// Parse YAML text; an empty document yields the defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.normalize_extensions();
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(C::CONFIG_FILENAME);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join(C::CONFIG_DIRNAME).join("config.yml"))
            .filter(|p| p.is_file())
    }

    fn apply_env(&mut self) {
        // Treat empty strings as unset
        if let Some(root) = std::env::var(C::ENV_NOTES_ROOT).ok().filter(|s| !s.is_empty()) {
            self.notes_root = PathBuf::from(root);
        }
        if let Some(root) = std::env::var(C::ENV_ASSETS_ROOT).ok().filter(|s| !s.is_empty()) {
            self.assets_root = PathBuf::from(root);
        }
    }

    /// Override roots (command line flags)
    pub fn with_roots(mut self, notes_root: Option<PathBuf>, assets_root: Option<PathBuf>) -> Self {
        if let Some(root) = notes_root {
            self.notes_root = root;
        }
        if let Some(root) = assets_root {
            self.assets_root = root;
        }
        self
    }

    /// Absolute, symlink-resolved notes and assets roots
    pub fn resolved_roots(&self) -> Result<(PathBuf, PathBuf)> {
        let notes_root =
            util::resolve_root(&self.notes_root).map_err(|e| Error::io("resolve", &self.notes_root, e))?;
        let assets_root =
            util::resolve_root(&self.assets_root).map_err(|e| Error::io("resolve", &self.assets_root, e))?;
        Ok((notes_root, assets_root))
    }

    /// Accept `md` as well as `.md` in the config file
    fn normalize_extensions(&mut self) {
        self.supported_extensions = self
            .supported_extensions
            .iter()
            .map(|ext| {
                let ext = ext.to_lowercase();
                if ext.starts_with('.') { ext } else { format!(".{}", ext) }
            })
            .collect();
    }

    /// Whether a path carries a supported note extension
    pub fn is_supported_note(&self, path: &Path) -> bool {
        util::dotted_extension(path)
            .map(|ext| self.supported_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Whether a file name is excluded (exact, case-sensitive match)
    pub fn is_excluded_name(&self, name: &str) -> bool {
        self.exclude_patterns.contains(name)
    }

    /// Whether a directory name is excluded from scans
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name)
    }

    /// Whether `path` is a managed note: supported extension and not excluded
    pub fn is_managed_note(&self, path: &Path) -> bool {
        let excluded = path
            .file_name()
            .map(|n| self.is_excluded_name(&n.to_string_lossy()))
            .unwrap_or(true);
        !excluded && self.is_supported_note(path)
    }

    /// Parse `timestamp_zone`, falling back to UTC on malformed input
    pub fn zone(&self) -> FixedOffset {
        let utc = Utc.fix();
        let Some(caps) = ZONE_RE.captures(self.timestamp_zone.trim()) else {
            warn!("Invalid timezone format: {}, using UTC+0", self.timestamp_zone);
            return utc;
        };
        let hours: f64 = caps[2].parse().unwrap_or(0.0);
        let seconds = (hours * 3600.0).round() as i32;
        let seconds = if &caps[1] == "-" { -seconds } else { seconds };
        FixedOffset::east_opt(seconds).unwrap_or_else(|| {
            warn!("Timezone offset out of range: {}, using UTC+0", self.timestamp_zone);
            utc
        })
    }
}
