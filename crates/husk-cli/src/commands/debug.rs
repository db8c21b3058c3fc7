//! `husk debug`: runs the same pipeline as `check` with `Config::debug`
//! forced on, so the closure map, reductions, and liveness map are logged
//! via `tracing` at debug level.

use crate::cli::CheckArgs;
use crate::commands::check::{self, RunOptions};

pub fn run(args: CheckArgs, mut opts: RunOptions) {
    opts.debug = true;
    check::run(args, opts);
}
