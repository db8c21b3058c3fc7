mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let opts = commands::check::RunOptions {
        write: cli.write,
        suppress: cli.suppress,
        color: cli.color,
        debug: false,
    };

    match cli.command {
        Command::Check(args) => commands::check::run(args, opts),
        Command::Debug(args) => commands::debug::run(args, opts),
    }
}
