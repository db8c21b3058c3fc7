//! Recognized run options.

/// Options accepted by both the library entry point and the CLI.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emit intermediate tables (closure map, reductions, liveness map) to
    /// stderr for inspection.
    pub debug: bool,
    /// Back-annotate source files with dead-value markers instead of (or in
    /// addition to) printing warnings.
    pub write: bool,
    /// Path prefixes whose warnings are suppressed from the report.
    pub suppress: Vec<String>,
}

impl Config {
    pub fn is_suppressed(&self, source_file: &str) -> bool {
        self.suppress.iter().any(|prefix| source_file.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppress_matches_by_prefix() {
        let config = Config {
            debug: false,
            write: false,
            suppress: vec!["vendor/".to_string()],
        };
        assert!(config.is_suppressed("vendor/lib.ml"));
        assert!(!config.is_suppressed("src/lib.ml"));
    }

    #[test]
    fn default_suppresses_nothing() {
        let config = Config::default();
        assert!(!config.is_suppressed("anything.ml"));
    }
}
