//! Wiki-link extraction
//!
//! Recognises `[[target]]` and `[[target|display text]]`. Targets are resolved
//! lexically against the linking note's directory; nothing is checked on disk.

use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use serde::Serialize;

use crate::constants as C;
use crate::util;

static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("valid wikilink pattern"));

/// One wiki-link occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    /// Target as written, without display text
    pub target: String,
    /// Display text after `|`, if any
    pub display: Option<String>,
    /// The full `[[...]]` match
    pub original: String,
}

#[derive(Debug, Clone)]
pub struct LinkParser {
    default_extension: String,
    ignore_code: bool,
}

impl Default for LinkParser {
    fn default() -> Self {
        Self {
            default_extension: C::DEFAULT_NOTE_EXTENSION.to_string(),
            ignore_code: true,
        }
    }
}

impl LinkParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extension appended to targets that carry none
    pub fn with_default_extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.default_extension = if ext.starts_with('.') { ext } else { format!(".{}", ext) };
        self
    }

    /// Whether links inside code blocks and inline code are skipped (default: yes)
    pub fn ignore_code(mut self, ignore: bool) -> Self {
        self.ignore_code = ignore;
        self
    }

    /// Absolute link targets in document order, repeated targets dropped
    pub fn parse(&self, content: &str, note_dir: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.extract_link_info(content)
            .iter()
            .filter_map(|info| self.resolve(&info.target, note_dir))
            .filter(|target| seen.insert(target.clone()))
            .collect()
    }

    /// Every wiki-link occurrence with its display text
    pub fn extract_link_info(&self, content: &str) -> Vec<LinkInfo> {
        let code = if self.ignore_code { code_ranges(content) } else { Vec::new() };

        WIKILINK_RE
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if code.iter().any(|range| range.contains(&whole.start())) {
                    return None;
                }
                Some(LinkInfo {
                    target: caps[1].trim().to_string(),
                    display: caps.get(2).map(|m| m.as_str().trim().to_string()),
                    original: whole.as_str().to_string(),
                })
            })
            .collect()
    }

    /// Resolve a raw target against the linking note's directory
    ///
    /// A `#section` suffix is dropped; a bare `[[#section]]` points at the
    /// note itself and yields `None`.
    pub fn resolve(&self, target: &str, note_dir: &Path) -> Option<PathBuf> {
        let target = match target.find('#') {
            Some(pos) => &target[..pos],
            None => target,
        }
        .trim();
        if target.is_empty() {
            return None;
        }

        let mut relative = target.to_string();
        if Path::new(target).extension().is_none() {
            relative.push_str(&self.default_extension);
        }
        Some(util::normalize_lexical(&note_dir.join(relative)))
    }
}

/// Byte ranges of fenced/indented code blocks and inline code spans
fn code_ranges(content: &str) -> Vec<Range<usize>> {
    Parser::new(content)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) => Some(range),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_appends_extension_and_resolves() {
        let parser = LinkParser::new();
        let links = parser.parse("See [[space]] and [[../sort/quick|Quick sort]].", Path::new("/n/dsa/anal"));
        assert_eq!(
            links,
            vec![PathBuf::from("/n/dsa/anal/space.md"), PathBuf::from("/n/dsa/sort/quick.md")]
        );
    }

    #[test]
    fn test_parse_keeps_explicit_extension() {
        let parser = LinkParser::new();
        let links = parser.parse("[[lab.ipynb]]", Path::new("/n"));
        assert_eq!(links, vec![PathBuf::from("/n/lab.ipynb")]);
    }

    #[test]
    fn test_parse_deduplicates_in_document_order() {
        let parser = LinkParser::new();
        let links = parser.parse("[[b]] [[a]] [[b|again]] [[b.md]]", Path::new("/n"));
        assert_eq!(links, vec![PathBuf::from("/n/b.md"), PathBuf::from("/n/a.md")]);
    }

    #[test]
    fn test_links_in_code_are_ignored() {
        let parser = LinkParser::new();
        let content = "[[real]]\n\n```\n[[fenced]]\n```\n\nInline `[[span]]` here.\n\n    [[indented]]\n";
        let links = parser.parse(content, Path::new("/n"));
        assert_eq!(links, vec![PathBuf::from("/n/real.md")]);

        let all = LinkParser::new().ignore_code(false).parse(content, Path::new("/n"));
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_extract_link_info() {
        let parser = LinkParser::new();
        let infos = parser.extract_link_info("[[target|Shown]] and [[plain]]");
        assert_eq!(
            infos,
            vec![
                LinkInfo {
                    target: "target".into(),
                    display: Some("Shown".into()),
                    original: "[[target|Shown]]".into(),
                },
                LinkInfo {
                    target: "plain".into(),
                    display: None,
                    original: "[[plain]]".into(),
                },
            ]
        );
    }

    #[test]
    fn test_resolve_section_links() {
        let parser = LinkParser::new();
        assert_eq!(parser.resolve("note#intro", Path::new("/n")), Some(PathBuf::from("/n/note.md")));
        assert_eq!(parser.resolve("#intro", Path::new("/n")), None);
    }

    #[test]
    fn test_no_links() {
        assert!(LinkParser::new().parse("[single] [[]] text", Path::new("/n")).is_empty());
    }
}
