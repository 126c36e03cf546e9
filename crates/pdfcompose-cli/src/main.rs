mod cli;
mod images_cmd;
mod merge_cmd;
mod page_range;
mod shared;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        cli::Commands::Merge {
            ref files,
            ref output,
            advanced,
            no_forms,
            ref format,
        } => merge_cmd::run(files, output, advanced, no_forms, format),
        cli::Commands::Images {
            ref file,
            ref pages,
            ref format,
            max_depth,
            stats,
            ref password,
        } => images_cmd::run(
            file,
            pages.as_deref(),
            format,
            max_depth,
            stats,
            password.as_deref(),
        ),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}

/// Log to stderr so stdout stays machine-readable.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
