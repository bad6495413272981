pub mod cli;
pub mod compliance;
pub mod config;
pub mod constants;
pub mod error;
pub mod frontmatter;
pub mod graph;
pub mod link_parser;
pub mod notebook;
pub mod path_mapper;
pub mod sync;
pub mod template;
pub mod tree;
pub mod util;

pub use cli::{Cli, Command, Context, GraphCommand};
pub use compliance::{ComplianceReport, ComplianceValidator, FixReport, Violation};
pub use config::Config;
pub use error::{Error, ErrorKind, OperationResult, Result};
pub use graph::{GraphBuilder, GraphExport, GraphExportOptions, LabelStrategy, NoteGraph, ValidationReport};
pub use link_parser::{LinkInfo, LinkParser};
pub use path_mapper::PathMapper;
pub use sync::{CleanOutcome, CreateOutcome, MoveOutcome, MovePlan, RemoveOutcome, SyncEngine};
pub use template::NoteTemplate;
pub use tree::{changed_notes, FileNode, NoteNode, TreeBuilder, TreeStats};
