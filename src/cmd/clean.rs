//! Orphaned asset directory clean-up
//!
//! Default mode is dry-run (list only), use --execute to actually delete.
//! Use --force to skip the confirmation prompt.

use std::io::{self, Write};

use note_assets::Context;

use super::output;

pub fn run(ctx: &Context, execute: bool, force: bool) -> io::Result<()> {
    let engine = ctx.engine()?;
    let assets_root = engine.assets_root().to_path_buf();

    let preview = engine.clean(true);
    if !execute || !preview.success {
        return output::report(ctx, preview, |outcome| {
            for orphan in &outcome.orphans {
                println!("  {}", output::rel(orphan, &assets_root));
            }
            if !outcome.orphans.is_empty() {
                println!();
                println!("Dry-run mode. Run with --execute to actually delete these directories.");
                println!("Tip: Use --execute --force to skip confirmation prompt.");
            }
        });
    }

    let orphans = preview.data.map(|o| o.orphans).unwrap_or_default();
    if orphans.is_empty() {
        return output::report(ctx, engine.clean(false), |_| {});
    }

    // Require confirmation unless --force is specified
    if !force {
        eprintln!("Orphaned asset directories:");
        for orphan in &orphans {
            eprintln!("  {}", output::rel(orphan, &assets_root));
        }
        eprint!("Delete {} director(ies)? [y/N] ", orphans.len());
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    let result = engine.clean(false);
    output::report(ctx, result, |outcome| {
        for dir in &outcome.removed {
            println!("  Deleted: {}", output::rel(dir, &assets_root));
        }
    })
}
