//! YAML front matter extraction
//!
//! A note's front matter is the YAML block between a leading `---` line and
//! the next `---` line. Anything else (no opening fence, unclosed block) means
//! the note has no metadata.

use std::collections::BTreeMap;

use crate::constants as C;
use crate::error::{Error, Result};

/// Parsed front matter: top-level keys to YAML values
pub type Metadata = BTreeMap<String, serde_yaml::Value>;

/// Split content into the raw front matter block (without fences) and the body
pub fn split(content: &str) -> (Option<&str>, &str) {
    let Some(after_fence) = content.strip_prefix(C::FRONTMATTER_FENCE) else {
        return (None, content);
    };
    // The opening fence must be alone on its line
    let Some(rest) = after_fence
        .strip_prefix("\r\n")
        .or_else(|| after_fence.strip_prefix('\n'))
    else {
        return (None, content);
    };

    // Empty block: closing fence right after the opening one
    let (yaml, after_close) = if let Some(after) = rest.strip_prefix(C::FRONTMATTER_FENCE) {
        ("", after)
    } else if let Some(end_pos) = rest.find("\n---") {
        (&rest[..end_pos], &rest[end_pos + 4..])
    } else {
        return (None, content);
    };

    // Skip the remainder of the closing fence line
    let body = match after_close.find('\n') {
        Some(pos) => &after_close[pos + 1..],
        None => "",
    };
    (Some(yaml.trim_end_matches('\r')), body)
}

/// Body of a note with any front matter removed
pub fn body(content: &str) -> &str {
    split(content).1
}

/// Parse the front matter of `content`
///
/// No front matter yields an empty map. A block that is too large, is not
/// valid YAML, or is not a mapping is an error.
pub fn parse(content: &str) -> Result<Metadata> {
    let Some(yaml) = split(content).0 else {
        return Ok(Metadata::new());
    };

    if yaml.len() > C::MAX_FRONTMATTER_SIZE {
        return Err(Error::Frontmatter(format!(
            "front matter exceeds {} bytes",
            C::MAX_FRONTMATTER_SIZE
        )));
    }
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| Error::Frontmatter(e.to_string()))?;
    match value {
        serde_yaml::Value::Mapping(map) => Ok(map
            .into_iter()
            .filter_map(|(k, v)| match k {
                serde_yaml::Value::String(key) => Some((key, v)),
                serde_yaml::Value::Number(n) => Some((n.to_string(), v)),
                serde_yaml::Value::Bool(b) => Some((b.to_string(), v)),
                _ => None,
            })
            .collect()),
        serde_yaml::Value::Null => Ok(Metadata::new()),
        _ => Err(Error::Frontmatter("front matter is not a mapping".to_string())),
    }
}

/// Render a scalar YAML value as plain text
pub fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        let content = "---\ntitle: Hello\n---\n# Body\n";
        let (yaml, body) = split(content);
        assert_eq!(yaml, Some("title: Hello"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_split_without_frontmatter() {
        let content = "# Just a heading\n---\n";
        assert_eq!(split(content), (None, content));
    }

    #[test]
    fn test_split_unclosed() {
        let content = "---\ntitle: Hello\nno closing fence\n";
        assert_eq!(split(content), (None, content));
    }

    #[test]
    fn test_split_empty_block() {
        let (yaml, body) = split("---\n---\ntext");
        assert_eq!(yaml, Some(""));
        assert_eq!(body, "text");
    }

    #[test]
    fn test_parse() {
        let content = "---\ntitle: Sorting\ntags: [algo, dsa]\npublish: true\n---\nbody";
        let metadata = parse(content).unwrap();
        assert_eq!(metadata["title"].as_str(), Some("Sorting"));
        assert_eq!(metadata["tags"].as_sequence().map(|s| s.len()), Some(2));
        assert_eq!(metadata["publish"].as_bool(), Some(true));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let content = "---\ntitle: [unclosed\n---\n";
        assert!(matches!(parse(content), Err(Error::Frontmatter(_))));
    }

    #[test]
    fn test_parse_non_mapping() {
        let content = "---\n- a\n- b\n---\n";
        assert!(matches!(parse(content), Err(Error::Frontmatter(_))));
    }

    #[test]
    fn test_parse_oversized() {
        let big = format!("---\nkey: \"{}\"\n---\n", "x".repeat(C::MAX_FRONTMATTER_SIZE));
        assert!(matches!(parse(&big), Err(Error::Frontmatter(_))));
    }

    #[test]
    fn test_parse_none() {
        assert!(parse("plain text").unwrap().is_empty());
    }
}
