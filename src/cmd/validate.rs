use std::io;

use note_assets::Context;

use super::output;

pub fn run(ctx: &Context, fix: bool) -> io::Result<()> {
    let engine = ctx.engine()?;
    let validator = engine.validator();
    let assets_root = validator.assets_root().to_path_buf();

    if fix {
        let result = validator.fix();
        return output::report(ctx, result, |report| {
            for dir in &report.created {
                println!("  created: {}", output::rel(dir, &assets_root));
            }
            for violation in &report.unresolved {
                eprintln!("  unresolved: {}", violation);
            }
        });
    }

    let result = validator.validate();
    let violations = result.data.as_ref().map(|r| r.violations.len()).unwrap_or(0);
    output::report(ctx, result, |report| {
        for violation in &report.violations {
            eprintln!("  {}", violation);
        }
        for warning in &report.warnings {
            eprintln!("  warning: {}", warning);
        }
        if !report.is_compliant {
            println!();
            println!("Run with --fix to create missing asset directories.");
        }
    })?;

    if violations > 0 {
        return Err(io::Error::other(format!("Found {} violation(s)", violations)));
    }
    Ok(())
}
