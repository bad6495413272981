//! Constants for note-assets
//!
//! Magic strings, default configuration values and limits used across the
//! crate, collected here so the scan, mapping and sync code agree on them.

// === Asset Tree Layout ===

/// Suffix appended to the first segment of a nested note's asset path
pub const CATEGORY_SUFFIX: &str = ".assets";

/// Prefix marking hidden files and directories (skipped by every scan)
pub const HIDDEN_PREFIX: char = '.';

// === Note Files ===

/// Extension appended to wiki-link targets that carry none
pub const DEFAULT_NOTE_EXTENSION: &str = ".md";

/// Markdown extension
pub const MARKDOWN_EXTENSION: &str = ".md";

/// Jupyter notebook extension
pub const NOTEBOOK_EXTENSION: &str = ".ipynb";

/// Extensions recognised as notes when the configuration names none
pub const DEFAULT_EXTENSIONS: &[&str] = &[MARKDOWN_EXTENSION, NOTEBOOK_EXTENSION];

/// File names never treated as notes
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["index.md", "README.md"];

/// Directory names never descended into
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["__pycache__", ".git", "node_modules"];

// === Configuration ===

/// Default notes root, relative to the working directory
pub const DEFAULT_NOTES_ROOT: &str = "docs";

/// Default assets root, relative to the working directory
pub const DEFAULT_ASSETS_ROOT: &str = "docs/assets";

/// Default template location
pub const DEFAULT_TEMPLATE_PATH: &str = "overrides/templates/default.md";

/// Default `{{date}}` format
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default zone for `{{date}}`
pub const DEFAULT_TIMESTAMP_ZONE: &str = "UTC+0";

/// Config file looked up in the working directory
pub const CONFIG_FILENAME: &str = "note-assets.yml";

/// Sub-directory of the user config dir holding `config.yml`
pub const CONFIG_DIRNAME: &str = "note-assets";

/// Environment variable overriding the notes root
pub const ENV_NOTES_ROOT: &str = "NOTE_ASSETS_NOTES_ROOT";

/// Environment variable overriding the assets root
pub const ENV_ASSETS_ROOT: &str = "NOTE_ASSETS_ASSETS_ROOT";

// === Templates ===

/// Template used when the configured template file is missing
pub const FALLBACK_TEMPLATE: &str = "---\ndate: {{date}}\ntitle: {{title}}\npermalink: \npublish: true\n---\n\n# {{title}}\n";

/// Title placeholder
pub const TOKEN_TITLE: &str = "{{title}}";

/// Date placeholder
pub const TOKEN_DATE: &str = "{{date}}";

/// Note name (file stem) placeholder
pub const TOKEN_NOTE_NAME: &str = "{{note_name}}";

// === Front Matter ===

/// Front matter fence
pub const FRONTMATTER_FENCE: &str = "---";

/// Maximum size of frontmatter to parse (prevents DoS on malformed files)
pub const MAX_FRONTMATTER_SIZE: usize = 64 * 1024; // 64KB

// === Fingerprints ===

/// Length of abbreviated content fingerprints
pub const HASH_ABBREVIATION_LENGTH: usize = 12;
