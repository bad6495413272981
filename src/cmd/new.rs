use std::io;
use std::path::Path;

use note_assets::{Context, NoteTemplate};

use super::output;

pub fn run(ctx: &Context, path: &Path, template: Option<&Path>) -> io::Result<()> {
    let engine = ctx.engine()?;
    let content = NoteTemplate::load(&ctx.config, template).render_now(path, &ctx.config);

    let result = engine.create(path, &content);
    output::report(ctx, result, |outcome| {
        println!("  note:   {}", outcome.note.display());
        println!("  assets: {}", outcome.asset_dir.display());
    })
}
