use std::io;
use std::path::PathBuf;

use note_assets::Context;

use super::output;

pub fn run(ctx: &Context, paths: &[PathBuf], keep_assets: bool) -> io::Result<()> {
    let engine = ctx.engine()?;

    if let [path] = paths {
        let result = engine.remove(path, !keep_assets);
        return output::report(ctx, result, |outcome| {
            for dir in &outcome.kept {
                println!("  kept (nested note): {}", output::rel(dir, engine.assets_root()));
            }
            for dir in &outcome.pruned {
                println!("  pruned: {}", output::rel(dir, engine.assets_root()));
            }
        });
    }

    let result = engine.remove_many(paths, !keep_assets);
    output::report(ctx, result, |batch| {
        for failure in &batch.failures {
            eprintln!("  failed: {}: {}", failure.note.display(), failure.message);
        }
    })
}
