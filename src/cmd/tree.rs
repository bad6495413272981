use std::io;
use std::path::Path;

use note_assets::{Context, NoteNode, TreeBuilder};

use super::output;

pub fn run(ctx: &Context, path: Option<&Path>, stats: bool) -> io::Result<()> {
    if stats {
        let (notes_root, assets_root) = ctx.roots()?;
        let dir = match path {
            Some(dir) => note_assets::util::resolve_path(dir)?,
            None => notes_root,
        };
        let (_, stats) = TreeBuilder::from_config(&ctx.config, &assets_root).build_with_stats(&dir)?;
        if ctx.json {
            return output::print_json(&stats);
        }
        println!("Files:          {}", stats.total_files);
        println!("Directories:    {}", stats.total_dirs);
        println!("Notes:          {}", stats.note_files);
        println!("With metadata:  {}", stats.notes_with_metadata);
        return Ok(());
    }

    let tree = ctx.scan(path)?;
    if ctx.json {
        return output::print_json(&tree);
    }
    println!("{}/", tree.path.display());
    for child in &tree.children {
        print_node(child, 1);
    }
    Ok(())
}

fn print_node(node: &NoteNode, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.is_dir {
        println!("{}{}/", indent, node.name());
        for child in &node.children {
            print_node(child, depth + 1);
        }
    } else if node.is_note && node.title() != node.stem() {
        println!("{}{}  [{}]", indent, node.name(), node.title());
    } else {
        println!("{}{}", indent, node.name());
    }
}
