use std::collections::BTreeMap;

use husk_analyze::{analyze_program, Config, Diagnostics, Warning};

use crate::cli::{CheckArgs, ColorMode};
use crate::commands::loader;

pub struct RunOptions {
    pub write: bool,
    pub suppress: Vec<String>,
    pub color: ColorMode,
    pub debug: bool,
}

pub fn run(args: CheckArgs, opts: RunOptions) {
    let (units, interner) = loader::load_units(&args.files).unwrap_or_else(|msg| {
        eprintln!("error: {}", msg);
        std::process::exit(1);
    });

    let config = Config { debug: opts.debug, write: opts.write, suppress: opts.suppress };

    let warnings = analyze_program(units, interner, &config).unwrap_or_else(|err| {
        eprintln!("error: {}", err);
        std::process::exit(1);
    });

    render(&warnings, opts.color);

    if opts.write {
        back_annotate(&warnings);
    }

    // Exit status is not affected by warnings; they are informational only.
}

fn render(warnings: &[Warning], color: ColorMode) {
    let mut by_file: BTreeMap<&str, Vec<&Warning>> = BTreeMap::new();
    for w in warnings {
        by_file.entry(w.source_file()).or_default().push(w);
    }

    for (file, file_warnings) in by_file {
        let diags = Diagnostics::from_warnings_for_file(file_warnings.iter().copied(), file);
        let source = loader::read_source(file);
        let mut printer = diags.printer().path(file).colored(color.resolve());
        if let Some(source) = source.as_deref() {
            printer = printer.source(source);
        }
        eprintln!("{}", printer.render());
    }
}

/// Appends a trailing comment marker after each dead range's line, in
/// descending byte-offset order per file so earlier insertions don't
/// shift the offsets of ones still to come.
fn back_annotate(warnings: &[Warning]) {
    let mut by_file: BTreeMap<&str, Vec<&Warning>> = BTreeMap::new();
    for w in warnings {
        by_file.entry(w.source_file()).or_default().push(w);
    }

    for (file, mut file_warnings) in by_file {
        let Some(mut source) = loader::read_source(file) else { continue };
        file_warnings.sort_by(|a, b| b.span.end.cmp(&a.span.end));
        for w in file_warnings {
            let end = w.span.end as usize;
            let insert_at = source[end.min(source.len())..]
                .find('\n')
                .map(|i| end + i)
                .unwrap_or(source.len());
            let marker = format!(" (* dead: {} *)", w.message);
            source.insert_str(insert_at, &marker);
        }
        if let Err(err) = std::fs::write(file, source) {
            eprintln!("error: failed to write {}: {}", file, err);
        }
    }
}
