//! Notes tree scanning
//!
//! [`TreeBuilder`] walks a notes root depth-first and produces an owned tree
//! of [`NoteNode`]s. Parents own their children; lookups by path go through
//! the graph's path-keyed map instead of parent pointers.
//!
//! Listing order is fixed: directories first, then case-insensitive name,
//! then exact name as tie-breaker.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::Serialize;

use crate::config::Config;
use crate::constants as C;
use crate::error::{Error, Result};
use crate::frontmatter::{self, Metadata};
use crate::notebook;
use crate::util;

/// Note path → content fingerprint, as produced by one scan
pub type Fingerprints = BTreeMap<PathBuf, String>;

/// A filesystem entry in the scanned tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl FileNode {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self { path: path.into(), is_dir }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A tree node with note-specific data
///
/// `out_links` and `backlinks` stay empty until a graph pass fills them.
#[derive(Debug, Clone, Serialize)]
pub struct NoteNode {
    #[serde(flatten)]
    pub file: FileNode,
    pub is_note: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip)]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub out_links: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backlinks: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NoteNode>,
}

impl Deref for NoteNode {
    type Target = FileNode;

    fn deref(&self) -> &Self::Target {
        &self.file
    }
}

impl NoteNode {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool, is_note: bool) -> Self {
        Self {
            file: FileNode::new(path, is_dir),
            is_note,
            metadata: Metadata::new(),
            fingerprint: None,
            heading: None,
            out_links: Vec::new(),
            backlinks: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Copy of this node without its children, for storage in a graph
    pub fn detached(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Front matter `title`, else the first level-one heading, else the file stem
    pub fn title(&self) -> String {
        self.metadata
            .get("title")
            .and_then(frontmatter::scalar_to_string)
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.heading.clone())
            .unwrap_or_else(|| self.stem())
    }

    /// Tags from a YAML list or a comma-separated string
    pub fn tags(&self) -> Vec<String> {
        match self.metadata.get("tags") {
            Some(serde_yaml::Value::Sequence(items)) => {
                items.iter().filter_map(frontmatter::scalar_to_string).collect()
            }
            Some(serde_yaml::Value::String(s)) => s
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `publish` flag, true when absent
    pub fn is_published(&self) -> bool {
        match self.metadata.get("publish") {
            Some(serde_yaml::Value::Bool(b)) => *b,
            Some(serde_yaml::Value::String(s)) => !s.eq_ignore_ascii_case("false"),
            _ => true,
        }
    }

    pub fn date(&self) -> Option<String> {
        self.metadata.get("date").and_then(frontmatter::scalar_to_string)
    }

    pub fn permalink(&self) -> Option<String> {
        self.metadata
            .get("permalink")
            .and_then(frontmatter::scalar_to_string)
            .filter(|p| !p.trim().is_empty())
    }

    /// Every note node in the subtree, in listing order
    pub fn notes(&self) -> Vec<&NoteNode> {
        let mut notes = Vec::new();
        self.collect_notes(&mut notes);
        notes
    }

    fn collect_notes<'a>(&'a self, out: &mut Vec<&'a NoteNode>) {
        if self.is_note {
            out.push(self);
        }
        for child in &self.children {
            child.collect_notes(out);
        }
    }

    /// Note paths of the subtree
    pub fn note_paths(&self) -> Vec<PathBuf> {
        self.notes().into_iter().map(|n| n.path.clone()).collect()
    }

    /// Find a node of the subtree by path
    pub fn find(&self, path: &Path) -> Option<&NoteNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Fingerprints of every readable note of the subtree
    pub fn fingerprints(&self) -> Fingerprints {
        self.notes()
            .into_iter()
            .filter_map(|n| n.fingerprint.clone().map(|fp| (n.path.clone(), fp)))
            .collect()
    }
}

/// Notes whose fingerprint differs between two scans, or that exist in only one
pub fn changed_notes(previous: &Fingerprints, current: &Fingerprints) -> BTreeSet<PathBuf> {
    let mut changed: BTreeSet<PathBuf> = current
        .iter()
        .filter(|(path, fp)| previous.get(*path) != Some(*fp))
        .map(|(path, _)| path.clone())
        .collect();
    changed.extend(previous.keys().filter(|p| !current.contains_key(*p)).cloned());
    changed
}

/// Counts gathered during a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub total_files: usize,
    pub total_dirs: usize,
    pub note_files: usize,
    pub notes_with_metadata: usize,
}

/// Read the linkable text of a note: the file itself, or the markdown and
/// raw cells of a notebook
pub fn read_note_text(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
    note_text(path, raw)
}

fn note_text(path: &Path, raw: String) -> Result<String> {
    let is_notebook = util::dotted_extension(path)
        .map(|ext| ext.eq_ignore_ascii_case(C::NOTEBOOK_EXTENSION))
        .unwrap_or(false);
    if is_notebook {
        notebook::extract_text(&raw)
    } else {
        Ok(raw)
    }
}

/// First level-one heading of a markdown body
fn first_heading(body: &str) -> Option<String> {
    let mut in_h1 = false;
    let mut text = String::new();
    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Heading { level: HeadingLevel::H1, .. }) => in_h1 = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                let heading = text.trim().to_string();
                return (!heading.is_empty()).then_some(heading);
            }
            Event::Text(t) | Event::Code(t) if in_h1 => text.push_str(&t),
            _ => {}
        }
    }
    None
}

type EntryFilter = Box<dyn Fn(&Path, bool) -> bool>;
type ProgressCallback = Box<dyn Fn(&Path)>;

/// Depth-first notes tree builder
pub struct TreeBuilder {
    extensions: BTreeSet<String>,
    parse_metadata: bool,
    skip_hidden: bool,
    exclude: Option<EntryFilter>,
    progress: Option<ProgressCallback>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            extensions: C::DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            parse_metadata: true,
            skip_hidden: true,
            exclude: None,
            progress: None,
        }
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder honouring the configured extensions and exclusions
    ///
    /// `assets_root` is skipped when it lies inside the scanned root.
    pub fn from_config(config: &Config, assets_root: &Path) -> Self {
        let exclude_dirs = config.exclude_dirs.clone();
        let exclude_names = config.exclude_patterns.clone();
        let assets_root = assets_root.to_path_buf();

        Self::new()
            .extensions(config.supported_extensions.clone())
            .exclude(move |path, is_dir| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if is_dir {
                    exclude_dirs.contains(&name) || path == assets_root
                } else {
                    exclude_names.contains(&name)
                }
            })
    }

    pub fn extensions(mut self, extensions: BTreeSet<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn parse_metadata(mut self, parse: bool) -> Self {
        self.parse_metadata = parse;
        self
    }

    pub fn skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Entries for which `exclude(path, is_dir)` is true are left out
    pub fn exclude(mut self, exclude: impl Fn(&Path, bool) -> bool + 'static) -> Self {
        self.exclude = Some(Box::new(exclude));
        self
    }

    /// Called once per node added to the tree
    pub fn on_progress(mut self, progress: impl Fn(&Path) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn is_note_path(&self, path: &Path) -> bool {
        util::dotted_extension(path)
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Scan `root` into a tree
    pub fn build(&self, root: &Path) -> Result<NoteNode> {
        self.build_with_stats(root).map(|(tree, _)| tree)
    }

    /// Scan `root` and report counts
    pub fn build_with_stats(&self, root: &Path) -> Result<(NoteNode, TreeStats)> {
        if !root.exists() {
            return Err(Error::NotFound(root.to_path_buf()));
        }
        let root = dunce::canonicalize(root).map_err(|e| Error::io("resolve", root, e))?;

        let mut stats = TreeStats::default();
        let tree = if root.is_dir() {
            let mut node = NoteNode::new(&root, true, false);
            self.report(&root);
            node.children = self.scan_dir(&root, &mut stats);
            node
        } else {
            self.scan_file(&root, &mut stats)
        };

        debug!(
            "Scanned {}: {} files, {} directories, {} notes",
            root.display(),
            stats.total_files,
            stats.total_dirs,
            stats.note_files
        );
        Ok((tree, stats))
    }

    fn report(&self, path: &Path) {
        if let Some(progress) = &self.progress {
            progress(path);
        }
    }

    fn scan_dir(&self, dir: &Path, stats: &mut TreeStats) -> Vec<NoteNode> {
        let entries = match list_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!("Permission denied, skipping {}", dir.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("Could not read directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut entries: Vec<(PathBuf, bool)> = entries
            .into_iter()
            .filter(|(path, is_dir)| {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                if self.skip_hidden && util::is_hidden(&name) {
                    return false;
                }
                !self.exclude.as_ref().is_some_and(|exclude| exclude(path.as_path(), *is_dir))
            })
            .collect();
        entries.sort_by(listing_order);

        let mut children = Vec::with_capacity(entries.len());
        for (path, is_dir) in entries {
            if is_dir {
                stats.total_dirs += 1;
                let mut node = NoteNode::new(&path, true, false);
                self.report(&path);
                node.children = self.scan_dir(&path, stats);
                children.push(node);
            } else {
                children.push(self.scan_file(&path, stats));
            }
        }
        children
    }

    fn scan_file(&self, path: &Path, stats: &mut TreeStats) -> NoteNode {
        stats.total_files += 1;
        let is_note = self.is_note_path(path);
        let mut node = NoteNode::new(path, false, is_note);
        self.report(path);
        if !is_note {
            return node;
        }

        stats.note_files += 1;
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read note {}: {}", path.display(), e);
                return node;
            }
        };
        node.fingerprint = Some(util::fingerprint(&raw));

        if self.parse_metadata {
            let text = String::from_utf8_lossy(&raw).into_owned();
            match note_text(path, text) {
                Ok(text) => {
                    node.metadata = frontmatter::parse(&text).unwrap_or_else(|e| {
                        warn!("Failed to parse metadata of {}: {}", path.display(), e);
                        Metadata::new()
                    });
                    node.heading = first_heading(frontmatter::body(&text));
                }
                Err(e) => warn!("Failed to read text of {}: {}", path.display(), e),
            }
            if !node.metadata.is_empty() {
                stats.notes_with_metadata += 1;
            }
        }
        node
    }
}

/// Directory entries as `(path, is_dir)`; symlinked directories are not followed
fn list_dir(dir: &Path) -> io::Result<Vec<(PathBuf, bool)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            entries.push((path, true));
        } else if path.is_file() {
            entries.push((path, false));
        }
    }
    Ok(entries)
}

fn listing_order(a: &(PathBuf, bool), b: &(PathBuf, bool)) -> Ordering {
    let name = |p: &PathBuf| p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let (name_a, name_b) = (name(&a.0), name(&b.0));
    // Directories first
    b.1.cmp(&a.1)
        .then_with(|| name_a.to_lowercase().cmp(&name_b.to_lowercase()))
        .then_with(|| name_a.cmp(&name_b))
}
