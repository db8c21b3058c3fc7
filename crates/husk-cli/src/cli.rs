//! Argument parsing: global flags plus the `check`/`debug` subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "husk", about = "Whole-program dead-value analyzer", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Back-annotate each reported artifact's source with a trailing
    /// comment noting the warning.
    #[arg(long, global = true)]
    pub write: bool,

    /// Suppress warnings whose source file starts with this prefix.
    /// May be passed more than once.
    #[arg(long = "suppress", value_name = "PREFIX", global = true)]
    pub suppress: Vec<String>,

    /// Colorize diagnostic output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    /// Increase log verbosity (`-v` debug, `-vv` trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the analyzer over one or more compilation-unit artifacts and
    /// print any dead-value warnings.
    Check(CheckArgs),
    /// Like `check`, but also dumps the closure map, reductions, and
    /// liveness map for inspection.
    Debug(CheckArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// JSON compilation-unit artifacts to analyze together as one program.
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn resolve(self) -> bool {
        use std::io::IsTerminal;
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stderr().is_terminal(),
        }
    }
}
