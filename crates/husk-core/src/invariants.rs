//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

use crate::Label;

/// Panics with a diagnostic message naming the offending label.
///
/// Used where a label is looked up in a table that the caller has already
/// promised it belongs to (e.g. the AST index) — a miss there is a bug in
/// the analyzer, not user-facing input error, so it panics rather than
/// returning a `Result`.
#[track_caller]
pub fn expect_label<T>(table_name: &'static str, label: Label, found: Option<T>) -> T {
    found.unwrap_or_else(|| {
        panic!("{table_name}: label {label} not found (every label must be preprocessed before use)")
    })
}
