//! New note content from a template
//!
//! Placeholders: `{{title}}`, `{{date}}`, `{{note_name}}`.

use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, warn};

use crate::config::Config;
use crate::constants as C;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteTemplate {
    content: String,
}

impl Default for NoteTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NoteTemplate {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    /// Built-in template with `date`, `title`, `permalink`, `publish` front matter
    pub fn builtin() -> Self {
        Self::new(C::FALLBACK_TEMPLATE)
    }

    /// First readable of: `custom`, the configured template, the built-in one
    pub fn load(config: &Config, custom: Option<&Path>) -> Self {
        let candidates = custom.into_iter().chain(std::iter::once(config.notes_template.as_path()));
        for path in candidates {
            if !path.is_file() {
                debug!("Template not found: {}", path.display());
                continue;
            }
            match fs::read_to_string(path) {
                Ok(content) => {
                    debug!("Using template {}", path.display());
                    return Self::new(content);
                }
                Err(e) => warn!("Failed to read template {}: {}", path.display(), e),
            }
        }
        Self::builtin()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Substitute the placeholders for `note` at time `now`
    pub fn render(&self, note: &Path, now: DateTime<FixedOffset>, date_format: &str) -> String {
        let note_name = note
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let date = now.format(date_format).to_string();

        self.content
            .replace(C::TOKEN_TITLE, &title_from_stem(&note_name))
            .replace(C::TOKEN_DATE, &date)
            .replace(C::TOKEN_NOTE_NAME, &note_name)
    }

    /// Render with the current time in the configured zone and format
    pub fn render_now(&self, note: &Path, config: &Config) -> String {
        let now = Utc::now().with_timezone(&config.zone());
        self.render(note, now, &config.date_format)
    }
}

/// `my-first_note` → `My First Note`
pub fn title_from_stem(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_title_from_stem() {
        assert_eq!(title_from_stem("my-first_note"), "My First Note");
        assert_eq!(title_from_stem("README"), "Readme");
        assert_eq!(title_from_stem("a--b"), "A  B");
    }

    #[test]
    fn test_render_replaces_all_tokens() {
        let template = NoteTemplate::new("# {{title}}\n\nCreated on {{date}}\n\nNote: {{note_name}}");
        let zone = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = zone.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let rendered = template.render(Path::new("docs/dsa/quick_sort.md"), now, "%Y-%m-%d %H:%M:%S");
        assert_eq!(rendered, "# Quick Sort\n\nCreated on 2024-03-01 09:30:00\n\nNote: quick_sort");
    }

    #[test]
    fn test_builtin_has_frontmatter() {
        let rendered = NoteTemplate::builtin().render_now(Path::new("hello-world.md"), &Config::default());
        let metadata = crate::frontmatter::parse(&rendered).unwrap();
        assert_eq!(metadata["title"].as_str(), Some("Hello World"));
        assert_eq!(metadata["publish"].as_bool(), Some(true));
        assert!(metadata.contains_key("date"));
        assert!(metadata.contains_key("permalink"));
    }

    #[test]
    fn test_load_prefers_custom_then_config() {
        let temp_dir = TempDir::new().unwrap();
        let custom = temp_dir.path().join("custom.md");
        let configured = temp_dir.path().join("configured.md");
        fs::write(&custom, "custom {{title}}").unwrap();
        fs::write(&configured, "configured {{title}}").unwrap();

        let mut config = Config::default();
        config.notes_template = configured.clone();
        assert_eq!(NoteTemplate::load(&config, Some(&custom)).content(), "custom {{title}}");
        assert_eq!(NoteTemplate::load(&config, None).content(), "configured {{title}}");

        config.notes_template = temp_dir.path().join("missing.md");
        assert_eq!(NoteTemplate::load(&config, None), NoteTemplate::builtin());
    }
}
