//! Whole-run and per-unit errors.

use husk_core::{Label, ModuleName};

/// Fatal errors abort the whole run; recoverable errors only skip the
/// offending compilation unit.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The same function label was handed to the preprocessor twice —
    /// an internal invariant violation, not a user-facing input error.
    #[error("duplicate label {0} during preprocessing")]
    DuplicateLabel(Label),

    /// A constraint or transformer referenced a label with no entry in the
    /// AST index. Every label used anywhere in the constraint system must
    /// have been assigned by the preprocessor first.
    #[error("label {0} missing from AST index")]
    MissingAstIndexEntry(Label),

    /// SCC discovery produced a component with no members, which cannot
    /// happen for a well-formed graph and indicates a bug in graph
    /// construction.
    #[error("liveness solver produced an empty strongly connected component")]
    EmptyScc,

    /// A compilation unit's typed-AST artifact could not be read at all
    /// (malformed JSON, missing required fields).
    #[error("unreadable input artifact for module {module:?}: {source}")]
    UnreadableArtifact {
        module: Option<ModuleName>,
        #[source]
        source: serde_json::Error,
    },

    /// A single compilation unit failed preprocessing in a way that does
    /// not compromise the rest of the program — e.g. a malformed pattern
    /// or unresolved self-reference confined to one unit. The unit is
    /// skipped; analysis continues.
    #[error("module {module:?} skipped: {reason}")]
    UnitSkipped { module: ModuleName, reason: String },
}

impl Error {
    /// Whether this error should only skip one compilation unit rather
    /// than abort the whole run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UnitSkipped { .. })
    }
}
