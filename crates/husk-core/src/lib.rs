//! Core data structures shared by the `husk` dead-value analyzer.
//!
//! - `interner` — string interning (`Symbol`/`Interner`)
//! - `ident` — labels, identifiers, module names, source spans
//! - `ast` — the typed AST artifact consumed from the host compiler
//! - `artifact` — JSON loading of on-disk compilation-unit artifacts
//! - `invariants` — internal consistency checks excluded from coverage

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod artifact;
pub mod ast;
pub mod ident;
pub mod interner;
pub mod invariants;

pub use artifact::{parse_artifact, merge_artifacts, Artifact};
pub use ast::{CompilationUnit, ExprKind, FunCase, MatchArm, Pattern, RecordField, TExpr, TopBinding};
pub use ident::{Id, Label, ModuleName, SourceLoc, Span};
pub use interner::{Interner, Symbol};
