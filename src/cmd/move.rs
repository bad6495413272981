use std::io;
use std::path::Path;

use note_assets::Context;

use super::output;

pub fn run(ctx: &Context, source: &Path, dest: &Path, keep_assets: bool) -> io::Result<()> {
    let engine = ctx.engine()?;
    let result = engine.move_path(source, dest, !keep_assets);

    output::report(ctx, result, |outcome| {
        for moved in &outcome.notes {
            let assets = if moved.assets_moved { " (+assets)" } else { "" };
            println!(
                "  {} -> {}{}",
                output::rel(&moved.from, engine.notes_root()),
                output::rel(&moved.to, engine.notes_root()),
                assets
            );
        }
        if outcome.other_files > 0 {
            println!("  {} other file(s) moved", outcome.other_files);
        }
    })
}
