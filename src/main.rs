use clap::Parser;
use note_assets::{Cli, Command, Context};

fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let ctx = Context::new(&cli)?;

    match cli.command {
        Command::New { path, template } => cmd::new::run(&ctx, &path, template.as_deref()),
        Command::Remove { paths, keep_assets } => cmd::remove::run(&ctx, &paths, keep_assets),
        Command::Move { source, dest, keep_assets } => {
            cmd::r#move::run(&ctx, &source, &dest, keep_assets)
        }
        Command::Clean { execute, force } => cmd::clean::run(&ctx, execute, force),
        Command::Validate { fix } => cmd::validate::run(&ctx, fix),
        Command::Tree { path, stats } => cmd::tree::run(&ctx, path.as_deref(), stats),
        Command::Graph(graph_cmd) => cmd::graph::run(&ctx, graph_cmd),
    }
}

/// `RUST_LOG` wins; otherwise `-v` → debug, `-q` → warn, default info
fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

mod cmd {
    pub mod output;
    pub mod new;
    pub mod remove;
    pub mod r#move;
    pub mod clean;
    pub mod validate;
    pub mod tree;
    pub mod graph;
}
