use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::constants as C;
use crate::graph::{GraphBuilder, LabelStrategy, NoteGraph};
use crate::sync::SyncEngine;
use crate::tree::{NoteNode, TreeBuilder};
use crate::util;

/// note-assets - Keep per-note asset directories in step with a notes tree
///
/// # Quick Reference
///
/// ## Notes and Assets
///
/// ```bash
/// note-assets new docs/dsa/sort.md          # Note + docs/assets/dsa.assets/sort/
/// note-assets new docs/ideas.md -t tpl.md   # Use a custom template
/// note-assets mv docs/old.md docs/new.md    # Move note together with its assets
/// note-assets mv docs/dsa docs/algorithms   # Move a whole category
/// note-assets rm docs/dsa/sort.md           # Remove note and its asset directory
/// note-assets rm docs/a.md --keep-assets    # Remove only the note
/// ```
///
/// ## Asset Tree Maintenance
///
/// ```bash
/// note-assets validate                      # Report missing asset directories
/// note-assets validate --fix                # Create the missing ones
/// note-assets clean                         # List orphaned asset directories
/// note-assets clean --execute               # Delete them (asks first)
/// note-assets clean --execute --force       # Delete without asking
/// ```
///
/// ## Link Graph
///
/// ```bash
/// note-assets graph links dsa/sort          # Outgoing wiki-links
/// note-assets graph backlinks dsa/sort      # Notes linking here
/// note-assets graph orphans                 # Notes with no links either way
/// note-assets graph broken                  # Links to missing notes
/// note-assets graph components              # Connected groups of notes
/// note-assets graph stats                   # Counts
/// note-assets graph export -o graph.json    # nodes/links JSON
/// ```
///
/// ## Asset Layout
///
/// - `docs/root.md`           → `docs/assets/root/`
/// - `docs/dsa/sort.md`       → `docs/assets/dsa.assets/sort/`
/// - `docs/dsa/anal/iter.md`  → `docs/assets/dsa.assets/anal/iter/`
///
/// ## Configuration
///
/// Read from `--config`, `./note-assets.yml`, or `<config dir>/note-assets/config.yml`.
///
/// - `NOTE_ASSETS_NOTES_ROOT`: notes root (default: docs)
/// - `NOTE_ASSETS_ASSETS_ROOT`: assets root (default: docs/assets)
/// - `RUST_LOG`: log filter (overrides -v/-q)
///
#[derive(Parser, Debug)]
#[command(name = "note-assets")]
#[command(version)]
#[command(about = "Keep per-note asset directories in step with a notes tree")]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Notes root directory
    #[arg(long, value_name = "PATH", global = true)]
    pub notes_root: Option<PathBuf>,

    /// Assets root directory
    #[arg(long, value_name = "PATH", global = true)]
    pub assets_root: Option<PathBuf>,

    /// Output in JSON format (for scripting)
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a note from a template, with its asset directory
    #[command(alias = "n")]
    New {
        /// Path of the new note
        path: PathBuf,

        /// Template file (default: configured template, then built-in)
        #[arg(short, long, value_name = "PATH")]
        template: Option<PathBuf>,
    },

    /// Remove notes and their asset directories
    #[command(alias = "rm")]
    Remove {
        /// Notes to remove
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Leave asset directories in place
        #[arg(long)]
        keep_assets: bool,
    },

    /// Move or rename a note or a directory of notes (mv semantics)
    #[command(alias = "mv")]
    Move {
        /// Note or directory to move
        source: PathBuf,

        /// New path, or an existing directory to move into
        dest: PathBuf,

        /// Leave asset directories in place
        #[arg(long)]
        keep_assets: bool,
    },

    /// Find orphaned asset directories (default is dry-run)
    Clean {
        /// Actually delete the orphaned directories
        #[arg(short, long)]
        execute: bool,

        /// Skip confirmation prompt when deleting
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Check that every note has its asset directory
    Validate {
        /// Create missing asset directories
        #[arg(long)]
        fix: bool,
    },

    /// Print the notes tree
    Tree {
        /// Directory to print (default: notes root)
        path: Option<PathBuf>,

        /// Print scan counts instead of the tree
        #[arg(long)]
        stats: bool,
    },

    /// Query the wiki-link graph
    #[command(subcommand)]
    Graph(GraphCommand),
}

#[derive(Subcommand, Debug)]
pub enum GraphCommand {
    /// List outgoing links of a note
    Links {
        /// Note path (relative to the notes root or working directory)
        note: String,
    },

    /// List notes linking to a note
    Backlinks {
        /// Note path (relative to the notes root or working directory)
        note: String,
    },

    /// List notes without incoming or outgoing links
    Orphans,

    /// List links whose target note does not exist
    Broken,

    /// List connected groups of notes
    Components,

    /// Print graph counts
    Stats,

    /// Export nodes and links as JSON
    Export {
        /// Node label
        #[arg(long, value_enum, default_value = "title")]
        label: LabelArg,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LabelArg {
    Title,
    FileName,
}

impl From<LabelArg> for LabelStrategy {
    fn from(arg: LabelArg) -> Self {
        match arg {
            LabelArg::Title => LabelStrategy::Title,
            LabelArg::FileName => LabelStrategy::FileName,
        }
    }
}

/// Resolved configuration and output mode shared by every command
pub struct Context {
    pub config: Config,
    pub json: bool,
}

impl Context {
    pub fn new(cli: &Cli) -> io::Result<Self> {
        let config = Config::load(cli.config.as_deref())?
            .with_roots(cli.notes_root.clone(), cli.assets_root.clone());
        Ok(Self {
            config,
            json: cli.json,
        })
    }

    pub fn engine(&self) -> io::Result<SyncEngine> {
        Ok(SyncEngine::new(&self.config)?)
    }

    pub fn roots(&self) -> io::Result<(PathBuf, PathBuf)> {
        Ok(self.config.resolved_roots()?)
    }

    /// Scan `dir` (default: the notes root) with the configured exclusions
    pub fn scan(&self, dir: Option<&Path>) -> io::Result<NoteNode> {
        let (notes_root, assets_root) = self.roots()?;
        let dir = match dir {
            Some(dir) => util::resolve_path(dir)?,
            None => notes_root,
        };
        Ok(TreeBuilder::from_config(&self.config, &assets_root).build(&dir)?)
    }

    /// Scan the notes root and build its link graph
    pub fn graph(&self) -> io::Result<NoteGraph> {
        let tree = self.scan(None)?;
        Ok(GraphBuilder::new().build(&tree))
    }

    /// Resolve a note argument: an existing path relative to the working
    /// directory, else a path relative to the notes root; `.md` is implied
    pub fn resolve_note(&self, input: &str) -> io::Result<PathBuf> {
        let (notes_root, _) = self.roots()?;
        let mut path = PathBuf::from(input);
        if path.extension().is_none() {
            path.set_extension(C::DEFAULT_NOTE_EXTENSION.trim_start_matches('.'));
        }
        let candidate = if path.exists() { path } else { notes_root.join(path) };
        util::resolve_path(&candidate)
    }
}
