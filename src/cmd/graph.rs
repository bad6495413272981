//! Wiki-link graph queries

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use note_assets::{Context, GraphBuilder, GraphCommand, GraphExportOptions, NoteGraph};
use serde::Serialize;

use super::output;

pub fn run(ctx: &Context, cmd: GraphCommand) -> io::Result<()> {
    let (notes_root, _) = ctx.roots()?;

    match cmd {
        GraphCommand::Links { note } => links(ctx, &notes_root, &note),
        GraphCommand::Backlinks { note } => backlinks(ctx, &notes_root, &note),
        GraphCommand::Orphans => orphans(ctx, &notes_root),
        GraphCommand::Broken => broken(ctx, &notes_root),
        GraphCommand::Components => components(ctx, &notes_root),
        GraphCommand::Stats => stats(ctx),
        GraphCommand::Export { label, output } => {
            let graph = ctx.graph()?;
            let options = GraphExportOptions {
                label: label.into(),
                root: Some(notes_root),
            };
            let json = serde_json::to_string_pretty(&graph.export(&options))
                .map_err(io::Error::other)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    eprintln!("Graph written to {}", path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }
    }
}

/// Note must be part of the scanned graph
fn graph_note(ctx: &Context, input: &str) -> io::Result<(NoteGraph, PathBuf)> {
    let graph = ctx.graph()?;
    let path = ctx.resolve_note(input)?;
    if !graph.contains(&path) {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Note not found: {}", input),
        ));
    }
    Ok((graph, path))
}

#[derive(Serialize)]
struct LinkEntry {
    path: String,
    exists: bool,
}

fn links(ctx: &Context, root: &Path, input: &str) -> io::Result<()> {
    let (graph, path) = graph_note(ctx, input)?;
    let entries: Vec<LinkEntry> = graph
        .get_outlinks(&path)
        .iter()
        .map(|target| LinkEntry {
            path: output::rel(target, root),
            exists: graph.contains(target),
        })
        .collect();

    if ctx.json {
        return output::print_json(&entries);
    }
    if entries.is_empty() {
        println!("No outgoing links.");
    }
    for entry in &entries {
        if entry.exists {
            println!("{}", entry.path);
        } else {
            println!("{}  (broken)", entry.path);
        }
    }
    Ok(())
}

fn backlinks(ctx: &Context, root: &Path, input: &str) -> io::Result<()> {
    let (graph, path) = graph_note(ctx, input)?;
    let sources: Vec<String> = graph
        .get_backlinks(&path)
        .iter()
        .map(|source| output::rel(source, root))
        .collect();

    if ctx.json {
        return output::print_json(&sources);
    }
    if sources.is_empty() {
        println!("No backlinks.");
    }
    for source in &sources {
        println!("{}", source);
    }
    Ok(())
}

fn orphans(ctx: &Context, root: &Path) -> io::Result<()> {
    let graph = ctx.graph()?;
    let orphans: Vec<String> = graph
        .find_orphaned_notes()
        .iter()
        .map(|path| output::rel(path, root))
        .collect();

    if ctx.json {
        return output::print_json(&orphans);
    }
    for orphan in &orphans {
        println!("{}", orphan);
    }
    println!("{} orphaned note(s)", orphans.len());
    Ok(())
}

#[derive(Serialize)]
struct BrokenEntry {
    source: String,
    target: String,
}

fn broken(ctx: &Context, root: &Path) -> io::Result<()> {
    let graph = ctx.graph()?;
    let broken: Vec<BrokenEntry> = graph
        .find_broken_links()
        .iter()
        .map(|(source, target)| BrokenEntry {
            source: output::rel(source, root),
            target: output::rel(target, root),
        })
        .collect();

    if ctx.json {
        output::print_json(&broken)?;
    } else if broken.is_empty() {
        println!("No broken links found. OK.");
    } else {
        for entry in &broken {
            println!("{}  ->  {}", entry.source, entry.target);
        }
    }

    if !broken.is_empty() {
        return Err(io::Error::other(format!("Found {} broken link(s)", broken.len())));
    }
    Ok(())
}

fn components(ctx: &Context, root: &Path) -> io::Result<()> {
    let graph = ctx.graph()?;
    let components: Vec<Vec<String>> = graph
        .get_connected_components()
        .iter()
        .map(|members| members.iter().map(|p| output::rel(p, root)).collect())
        .collect();

    if ctx.json {
        return output::print_json(&components);
    }
    for (i, members) in components.iter().enumerate() {
        println!("Component {} ({} note(s)):", i + 1, members.len());
        for member in members {
            println!("  {}", member);
        }
    }
    Ok(())
}

fn stats(ctx: &Context) -> io::Result<()> {
    let tree = ctx.scan(None)?;
    let (_, report) = GraphBuilder::new().build_with_validation(&tree);

    if ctx.json {
        return output::print_json(&report);
    }
    println!("Nodes:       {}", report.total_nodes);
    println!("Notes:       {}", report.note_count);
    println!("Links:       {}", report.total_links);
    println!("Broken:      {}", report.broken_links.len());
    println!("Orphans:     {}", report.orphaned_notes.len());
    println!("Components:  {}", report.connected_components);
    Ok(())
}
