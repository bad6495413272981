//! Note link graph
//!
//! [`NoteGraph`] stores notes by canonical path plus a forward adjacency map.
//! Backlinks are never authored: they are the reverse lookup of the adjacency
//! map, and the `backlinks` field of stored nodes is refreshed from it
//! whenever edges change.
//!
//! [`GraphBuilder`] fills a graph from a scanned tree in three passes (nodes,
//! edges, backlinks) and can update it for a known set of changed notes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use crate::link_parser::LinkParser;
use crate::tree::{self, NoteNode};
use crate::util;

#[derive(Debug, Clone, Default)]
pub struct NoteGraph {
    nodes: BTreeMap<PathBuf, NoteNode>,
    adjacency: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl NoteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node; existing out-edges of the path are kept
    pub fn add_node(&mut self, node: NoteNode) {
        let path = node.path.clone();
        self.insert_node(node);
        self.sync_outlinks(&path);
        self.refresh_backlinks([path.as_path()]);
    }

    fn insert_node(&mut self, node: NoteNode) {
        let path = node.path.clone();
        let mut node = node.detached();
        node.out_links.clear();
        node.backlinks.clear();
        self.adjacency.entry(path.clone()).or_default();
        self.nodes.insert(path, node);
    }

    /// Add a directed edge; adding an existing edge is a no-op
    pub fn add_edge(&mut self, source: &Path, target: &Path) {
        if self.insert_edge(source, target) {
            self.sync_outlinks(source);
            self.refresh_backlinks([target]);
        }
    }

    fn insert_edge(&mut self, source: &Path, target: &Path) -> bool {
        let targets = self.adjacency.entry(source.to_path_buf()).or_default();
        if targets.iter().any(|t| t == target) {
            return false;
        }
        targets.push(target.to_path_buf());
        true
    }

    /// Remove a directed edge, if present
    pub fn remove_edge(&mut self, source: &Path, target: &Path) {
        let removed = match self.adjacency.get_mut(source) {
            Some(targets) => {
                let before = targets.len();
                targets.retain(|t| t != target);
                targets.len() != before
            }
            None => false,
        };
        if removed {
            self.sync_outlinks(source);
            self.refresh_backlinks([target]);
        }
    }

    /// Remove a node and its out-edges; edges pointing at it stay, now broken
    ///
    /// Mirrors a note deleted from disk while other notes still link to it.
    pub fn detach_node(&mut self, path: &Path) -> Option<NoteNode> {
        let removed = self.nodes.remove(path);
        let old_targets = self.adjacency.remove(path).unwrap_or_default();
        self.refresh_backlinks(old_targets.iter().map(PathBuf::as_path));
        if removed.is_some() {
            debug!("Detached graph node {}", path.display());
        }
        removed
    }

    /// Remove a node, its out-edges and every edge pointing at it
    pub fn remove_node(&mut self, path: &Path) -> Option<NoteNode> {
        let removed = self.nodes.remove(path);
        let old_targets = self.adjacency.remove(path).unwrap_or_default();

        let mut sources = Vec::new();
        for (source, targets) in self.adjacency.iter_mut() {
            let before = targets.len();
            targets.retain(|t| t != path);
            if targets.len() != before {
                sources.push(source.clone());
            }
        }
        for source in &sources {
            self.sync_outlinks(source);
        }
        self.refresh_backlinks(old_targets.iter().map(PathBuf::as_path));

        if removed.is_some() {
            debug!("Removed graph node {}", path.display());
        }
        removed
    }

    /// Remove every out-edge of `source`, returning the old targets
    fn clear_outlinks(&mut self, source: &Path) -> Vec<PathBuf> {
        let old = self
            .adjacency
            .get_mut(source)
            .map(std::mem::take)
            .unwrap_or_default();
        self.sync_outlinks(source);
        old
    }

    fn sync_outlinks(&mut self, source: &Path) {
        if let Some(node) = self.nodes.get_mut(source) {
            node.out_links = self.adjacency.get(source).cloned().unwrap_or_default();
        }
    }

    /// Recompute the stored backlinks of the given nodes from the adjacency map
    pub fn refresh_backlinks<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) {
        for path in paths {
            if !self.nodes.contains_key(path) {
                continue;
            }
            let backlinks = self.get_backlinks(path);
            if let Some(node) = self.nodes.get_mut(path) {
                node.backlinks = backlinks;
            }
        }
    }

    fn refresh_all_backlinks(&mut self) {
        let mut reverse: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for (source, targets) in &self.adjacency {
            for target in targets {
                reverse.entry(target.clone()).or_default().push(source.clone());
            }
        }
        for (path, node) in self.nodes.iter_mut() {
            node.backlinks = reverse.get(path).cloned().unwrap_or_default();
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn node(&self, path: &Path) -> Option<&NoteNode> {
        self.nodes.get(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NoteNode> {
        self.nodes.values()
    }

    /// Targets of `path`, empty for an unknown path
    pub fn get_outlinks(&self, path: &Path) -> &[PathBuf] {
        self.adjacency.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sources linking to `path`, empty for an unknown path
    pub fn get_backlinks(&self, path: &Path) -> Vec<PathBuf> {
        self.adjacency
            .iter()
            .filter(|(_, targets)| targets.iter().any(|t| t == path))
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Notes with neither outgoing nor incoming links
    pub fn find_orphaned_notes(&self) -> Vec<PathBuf> {
        let linked: BTreeSet<&PathBuf> = self.adjacency.values().flatten().collect();
        self.nodes
            .values()
            .filter(|node| node.is_note)
            .filter(|node| self.get_outlinks(&node.path).is_empty() && !linked.contains(&node.path))
            .map(|node| node.path.clone())
            .collect()
    }

    /// Every `(source, target)` edge whose target is not a known note
    pub fn find_broken_links(&self) -> Vec<(PathBuf, PathBuf)> {
        self.adjacency
            .iter()
            .flat_map(|(source, targets)| {
                targets
                    .iter()
                    .filter(move |t| !self.nodes.contains_key(*t))
                    .map(move |t| (source.clone(), t.clone()))
            })
            .collect()
    }

    /// Partition of the nodes under undirected connectivity
    ///
    /// Edges to unknown targets are ignored. Components come in order of their
    /// smallest member; members are sorted.
    pub fn get_connected_components(&self) -> Vec<Vec<PathBuf>> {
        let mut neighbors: BTreeMap<&Path, Vec<&Path>> = BTreeMap::new();
        for (source, targets) in &self.adjacency {
            if !self.nodes.contains_key(source) {
                continue;
            }
            for target in targets.iter().filter(|t| self.nodes.contains_key(*t)) {
                neighbors.entry(source.as_path()).or_default().push(target.as_path());
                neighbors.entry(target.as_path()).or_default().push(source.as_path());
            }
        }

        let mut visited: BTreeSet<&Path> = BTreeSet::new();
        let mut components = Vec::new();
        for start in self.nodes.keys() {
            if visited.contains(start.as_path()) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start.as_path()];
            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                component.push(current.to_path_buf());
                if let Some(next) = neighbors.get(current) {
                    stack.extend(next.iter().copied().filter(|n| !visited.contains(n)));
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }

    pub fn note_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_note).count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges, broken ones included
    pub fn link_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Serialisable nodes/links view; broken edges are left out
    pub fn export(&self, options: &GraphExportOptions) -> GraphExport {
        let id = |path: &Path| match &options.root {
            Some(root) => util::display_relative(path, root),
            None => util::display_path(path),
        };

        let nodes = self
            .nodes
            .values()
            .map(|node| ExportNode {
                id: id(&node.path),
                label: match options.label {
                    LabelStrategy::Title => node.title(),
                    LabelStrategy::FileName => node.stem(),
                },
                path: util::display_path(&node.path),
            })
            .collect();

        let links: Vec<ExportLink> = self
            .adjacency
            .iter()
            .filter(|(source, _)| self.nodes.contains_key(*source))
            .flat_map(|(source, targets)| {
                targets
                    .iter()
                    .filter(move |t| self.nodes.contains_key(*t))
                    .map(move |t| (source, t))
            })
            .map(|(source, target)| ExportLink {
                source: id(source),
                target: id(target),
            })
            .collect();

        GraphExport {
            metadata: ExportMetadata {
                node_count: self.node_count(),
                link_count: links.len(),
                broken_link_count: self.find_broken_links().len(),
                orphan_count: self.find_orphaned_notes().len(),
                component_count: self.get_connected_components().len(),
            },
            nodes,
            links,
        }
    }
}

/// How exported nodes are labelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelStrategy {
    #[default]
    Title,
    FileName,
}

#[derive(Debug, Clone, Default)]
pub struct GraphExportOptions {
    pub label: LabelStrategy,
    /// Node ids are made relative to this directory when set
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub node_count: usize,
    pub link_count: usize,
    pub broken_link_count: usize,
    pub orphan_count: usize,
    pub component_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportLink>,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Summary of a full build
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub total_nodes: usize,
    pub total_links: usize,
    pub note_count: usize,
    pub broken_links: Vec<BrokenLink>,
    pub orphaned_notes: Vec<PathBuf>,
    pub connected_components: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    parser: LinkParser,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(parser: LinkParser) -> Self {
        Self { parser }
    }

    /// Build a graph from a scanned tree
    pub fn build(&self, tree: &NoteNode) -> NoteGraph {
        let mut graph = NoteGraph::new();
        let notes = tree.notes();

        // Node pass
        for note in &notes {
            graph.insert_node((*note).clone());
        }

        // Edge pass
        for note in &notes {
            for target in self.links_of(&note.path) {
                graph.insert_edge(&note.path, &target);
            }
            graph.sync_outlinks(&note.path);
        }

        // Backlink pass
        graph.refresh_all_backlinks();

        debug!(
            "Built graph: {} notes, {} links",
            graph.note_count(),
            graph.link_count()
        );
        graph
    }

    /// Build and summarise
    pub fn build_with_validation(&self, tree: &NoteNode) -> (NoteGraph, ValidationReport) {
        let graph = self.build(tree);
        let report = ValidationReport {
            total_nodes: graph.node_count(),
            total_links: graph.link_count(),
            note_count: graph.note_count(),
            broken_links: graph
                .find_broken_links()
                .into_iter()
                .map(|(source, target)| BrokenLink { source, target })
                .collect(),
            orphaned_notes: graph.find_orphaned_notes(),
            connected_components: graph.get_connected_components().len(),
        };
        (graph, report)
    }

    /// Re-link only the changed notes against a fresh scan
    ///
    /// Notes missing from `tree` are detached; links to them stay as broken
    /// edges, as a full build would find them. Backlinks are
    /// recomputed only for the changed notes and their old and new targets.
    pub fn update(&self, graph: &mut NoteGraph, tree: &NoteNode, changed: &BTreeSet<PathBuf>) {
        let mut affected: BTreeSet<PathBuf> = BTreeSet::new();

        for path in changed {
            let Some(node) = tree.find(path).filter(|n| n.is_note) else {
                graph.detach_node(path);
                continue;
            };

            let old_targets = graph.clear_outlinks(path);
            graph.insert_node(node.clone());
            let new_targets = self.links_of(path);
            for target in &new_targets {
                graph.insert_edge(path, target);
            }
            graph.sync_outlinks(path);

            affected.insert(path.clone());
            affected.extend(old_targets);
            affected.extend(new_targets);
        }

        graph.refresh_backlinks(affected.iter().map(PathBuf::as_path));
        debug!("Updated {} changed note(s), {} affected", changed.len(), affected.len());
    }

    fn links_of(&self, note: &Path) -> Vec<PathBuf> {
        let text = match tree::read_note_text(note) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping links of {}: {}", note.display(), e);
                return Vec::new();
            }
        };
        let dir = note.parent().unwrap_or(note);
        self.parser.parse(&text, dir)
    }
}
