//! Reads `CheckArgs::files` off disk into one merged program.

use std::path::Path;

use husk_core::{CompilationUnit, Interner};

pub fn load_units(files: &[std::path::PathBuf]) -> Result<(Vec<CompilationUnit>, Interner), String> {
    let mut artifacts = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        let artifact = husk_core::parse_artifact(&text)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        artifacts.push(artifact);
    }
    Ok(husk_core::merge_artifacts(artifacts))
}

/// Reads a source file's text for diagnostic rendering, tolerating a
/// missing file (the excerpt is just omitted, per the plain-text fallback
/// in [`husk_analyze::DiagnosticsPrinter`]).
pub fn read_source(file: &str) -> Option<String> {
    std::fs::read_to_string(Path::new(file)).ok()
}
