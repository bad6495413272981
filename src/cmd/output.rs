//! Shared result printing for commands

use std::io;
use std::path::Path;

use note_assets::util;
use note_assets::{Context, OperationResult};
use serde::Serialize;

/// Print an operation result as text or JSON and turn failure into an error
pub fn report<T: Serialize>(
    ctx: &Context,
    result: OperationResult<T>,
    details: impl FnOnce(&T),
) -> io::Result<()> {
    if ctx.json {
        print_json(&result)?;
    } else if result.success {
        println!("{}", result.message);
        if let Some(data) = &result.data {
            details(data);
        }
    } else {
        eprintln!("Error: {}", result.message);
    }
    result.into_io().map(|_| ())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    println!("{}", json);
    Ok(())
}

/// Path shown relative to `root` with forward slashes
pub fn rel(path: &Path, root: &Path) -> String {
    util::display_relative(path, root)
}
