//! Labels and identifiers: the flow-node keys the rest of the analyzer
//! is built around.

use crate::Symbol;

/// An opaque globally unique handle assigned to every expression and every
/// module-expression occurrence by the preprocessor.
///
/// Labels are created only by the preprocessor; they are immutable
/// thereafter. A label resolves, via the AST index, back to the original
/// source location and a structural summary of the node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
pub struct Label(pub u32);

impl Label {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// The name of a compilation unit ("cmt module"), interned for cheap
/// comparison across the whole program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
pub struct ModuleName(pub Symbol);

/// A bound name: `(cmt-module-name, local-stamp)`.
///
/// Local stamps are unique within a compilation unit; top-level module
/// identifiers are additionally global. Every bound name (let/function
/// parameter/pattern variable/for-index/module binding) is exactly one Id.
/// Identifiers of external top-level modules are synthesized on demand by
/// the preprocessor, using stamp `0` to mean "the module itself" rather
/// than one of its members.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
pub struct Id {
    pub module: ModuleName,
    pub stamp: u32,
}

impl Id {
    pub fn new(module: ModuleName, stamp: u32) -> Self {
        Self { module, stamp }
    }

    /// The synthetic Id standing for "this external module as a whole,"
    /// used when an unresolved cross-module reference escapes to a module
    /// we have no tracked definition for.
    pub fn module_root(module: ModuleName) -> Self {
        Self { module, stamp: 0 }
    }
}

/// A byte-offset source span within a single source file.
///
/// Offsets are UTF-8 byte offsets, matching what `annotate-snippets`
/// expects for its underline rendering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start must not exceed end");
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Original source location a label resolves to: which file, and where in
/// it. Line is recomputed lazily by the diagnostics printer from the span
/// and the source text rather than stored redundantly here.
#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub span: Span,
}
