//! Whole-program dead-value analysis for typed ML-family ASTs.
//!
//! The pipeline, leaves first:
//! - `preprocess` — assigns fresh labels, builds the AST index
//! - `value` — the abstract-value and value-set lattice (`VS`)
//! - `constrain` — the constraint generator (one rule per expression kind)
//! - `closure` — the closure solver (transitive closure + reduction resolution)
//! - `liveness` — the `Live` lattice
//! - `depgraph` — the value-dependency graph and its monotone transformers
//! - `solve` — SCC discovery and the liveness fixed point
//! - `report` — turns a solved liveness map into ordered warnings
//! - `diagnostics` — warning rendering via `annotate-snippets`
//! - `config` — recognized run options
//! - `error` — fatal, whole-run errors

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod closure;
pub mod config;
pub mod constrain;
pub mod depgraph;
pub mod diagnostics;
pub mod error;
pub mod liveness;
pub mod preprocess;
pub mod report;
pub mod solve;
pub mod value;

pub use config::Config;
pub use diagnostics::{Diagnostics, DiagnosticsPrinter, Severity};
pub use error::Error;
pub use report::Warning;

use husk_core::{CompilationUnit, Interner};

/// Result type for whole-run analysis: the emitted warnings, or a fatal
/// error that aborted the run before any warnings could be produced.
pub type AnalyzeResult = std::result::Result<Vec<Warning>, Error>;

/// Run the full pipeline over a set of compilation units.
///
/// `interner` resolves the `Symbol`s embedded in `units` back to strings,
/// for primitive-name lookups and diagnostic messages; it is shared with
/// whatever loaded the input artifacts.
///
/// Per-unit preprocessing errors are recoverable: the offending unit is
/// skipped (with a warning folded into the returned diagnostics) and
/// analysis continues over the rest of the program.
/// Internal invariant violations and unreadable artifacts are fatal and
/// short-circuit the whole run.
pub fn analyze_program(units: Vec<CompilationUnit>, interner: Interner, config: &Config) -> AnalyzeResult {
    let mut program = preprocess::Program::with_interner(interner);
    let mut skipped = Vec::new();

    for unit in units {
        let name = unit.name;
        match program.add_unit(unit) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                tracing::warn!(module = ?name, %err, "skipping compilation unit");
                skipped.push((name, err));
            }
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(units = program.units.len(), "preprocessing complete");

    let mut constraints = constrain::Generator::new(&program);
    constraints.run();

    tracing::debug!(
        abstract_values = constraints.closure.value_count(),
        reductions = constraints.pending_reductions(),
        "constraint generation complete"
    );

    let closure = closure::solve(&program, constraints)?;
    tracing::debug!("closure solver reached fixed point");

    let graph = depgraph::build(&program, &closure);
    tracing::debug!(nodes = graph.node_count(), "dependency graph built");

    let liveness = solve::solve(&graph);
    tracing::debug!("liveness solver reached fixed point");

    if config.debug {
        diagnostics::dump_debug_tables(&program, &closure, &liveness);
    }

    let mut warnings = report::report(&program, &closure, &liveness);
    warnings.retain(|w| !config.is_suppressed(w.source_file()));
    warnings.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    Ok(warnings)
}

/// End-to-end tests straight off spec's own worked examples (§8): build a
/// tiny program by hand — no host-compiler artifact needed — and check
/// the warnings `analyze_program` actually emits for it.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::WarningKind;
    use husk_core::{
        CompilationUnit, ExprKind, FunCase, Id, Interner, MatchArm, ModuleName, Pattern, RecordField, SourceLoc, Span,
        TExpr, TopBinding,
    };

    fn at(n: u32) -> SourceLoc {
        SourceLoc { file: "t.ml".to_string(), span: Span::new(n, n + 1) }
    }

    fn unit_texpr(n: u32) -> TExpr {
        let mut e = TExpr::new(at(n), ExprKind::Const);
        e.unit_result = true;
        e
    }

    fn run(unit: CompilationUnit, interner: Interner) -> Vec<Warning> {
        analyze_program(vec![unit], interner, &Config::default()).expect("analysis succeeds")
    }

    /// `let x = 1 in let y = 2 in x` -> warn on `y` (dead binding) and on
    /// the inner `let`'s subexpression `2` (dead expression); `x` is live.
    #[test]
    fn dead_nested_let_binding_and_value() {
        let mut interner = Interner::new();
        let module = ModuleName(interner.intern("m"));
        let id_main = Id::new(module, 0);
        let id_x = Id::new(module, 1);
        let id_y = Id::new(module, 2);

        let inner = TExpr::new(
            at(20),
            ExprKind::Let {
                pat: Pattern::Var(id_y),
                value: Box::new(TExpr::new(at(10), ExprKind::Const)),
                body: Box::new(TExpr::new(at(15), ExprKind::Var(Some(id_x)))),
            },
        );
        let outer = TExpr::new(
            at(0),
            ExprKind::Let {
                pat: Pattern::Var(id_x),
                value: Box::new(TExpr::new(at(1), ExprKind::Const)),
                body: Box::new(inner),
            },
        );

        let unit = CompilationUnit {
            name: module,
            bindings: vec![TopBinding {
                recursive: false,
                name: Some(interner.intern("main")),
                pat: Pattern::Var(id_main),
                value: outer,
            }],
            signature: None,
            label: husk_core::Label::default(),
        };

        let warnings = run(unit, interner);
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings.iter().any(|w| w.kind == WarningKind::DeadBinding && w.span == Span::new(10, 11)));
        assert!(warnings.iter().any(|w| w.kind == WarningKind::DeadExpression && w.span == Span::new(10, 11)));
    }

    /// `let f x = x + 1 in f 3` (addition is a tainting primitive): no
    /// warning — the primitive forces both operands live.
    #[test]
    fn tainting_primitive_forces_operands_live() {
        let mut interner = Interner::new();
        let module = ModuleName(interner.intern("m"));
        let add = interner.intern("%addint");
        let id_result = Id::new(module, 0);
        let id_f = Id::new(module, 1);
        let id_x = Id::new(module, 2);

        let add_body = TExpr::new(
            at(10),
            ExprKind::App {
                func: Box::new(TExpr::new(at(11), ExprKind::Prim(add))),
                args: vec![TExpr::new(at(12), ExprKind::Var(Some(id_x))), TExpr::new(at(13), ExprKind::Const)],
            },
        );
        let fun = TExpr::new(
            at(5),
            ExprKind::Fun { param: id_x, cases: vec![FunCase { pat: Pattern::Var(id_x), body: add_body }] },
        );
        let call = TExpr::new(
            at(20),
            ExprKind::App {
                func: Box::new(TExpr::new(at(21), ExprKind::Var(Some(id_f)))),
                args: vec![TExpr::new(at(22), ExprKind::Const)],
            },
        );
        let outer = TExpr::new(
            at(0),
            ExprKind::Let { pat: Pattern::Var(id_f), value: Box::new(fun), body: Box::new(call) },
        );

        let unit = CompilationUnit {
            name: module,
            bindings: vec![TopBinding {
                recursive: false,
                name: Some(interner.intern("result")),
                pat: Pattern::Var(id_result),
                value: outer,
            }],
            signature: None,
            label: husk_core::Label::default(),
        };

        let warnings = run(unit, interner);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    /// `let pair = (1, 2) in let (a, _) = pair in a` (the host language's
    /// `fst` desugars to a tuple-pattern `let`) -> warn on the second
    /// tuple component `2`, not on `pair` itself.
    #[test]
    fn dead_tuple_slot_not_whole_tuple() {
        let mut interner = Interner::new();
        let module = ModuleName(interner.intern("m"));
        let id_main = Id::new(module, 0);
        let id_pair = Id::new(module, 1);
        let id_a = Id::new(module, 2);

        let tuple = TExpr::new(
            at(10),
            ExprKind::Tuple(vec![TExpr::new(at(11), ExprKind::Const), TExpr::new(at(12), ExprKind::Const)]),
        );
        let destructure = TExpr::new(
            at(20),
            ExprKind::Let {
                pat: Pattern::Tuple(vec![Pattern::Var(id_a), Pattern::Wildcard]),
                value: Box::new(TExpr::new(at(21), ExprKind::Var(Some(id_pair)))),
                body: Box::new(TExpr::new(at(22), ExprKind::Var(Some(id_a)))),
            },
        );
        let outer = TExpr::new(
            at(0),
            ExprKind::Let { pat: Pattern::Var(id_pair), value: Box::new(tuple), body: Box::new(destructure) },
        );

        let unit = CompilationUnit {
            name: module,
            bindings: vec![TopBinding {
                recursive: false,
                name: Some(interner.intern("main")),
                pat: Pattern::Var(id_main),
                value: outer,
            }],
            signature: None,
            label: husk_core::Label::default(),
        };

        let warnings = run(unit, interner);
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert_eq!(warnings[0].kind, WarningKind::DeadExpression);
        assert_eq!(warnings[0].span, Span::new(12, 13));
    }

    /// `let r = { a = 1; b = compute() } in r.a` where `compute()` has a
    /// side effect -> `b`'s expression is not dead (side effect); the
    /// unused *value* of `r.b` goes unreported, no warning at all.
    #[test]
    fn side_effecting_field_initializer_not_reported_dead() {
        let mut interner = Interner::new();
        let module = ModuleName(interner.intern("m"));
        let field_a = interner.intern("a");
        let field_b = interner.intern("b");
        let println_prim = interner.intern("%println"); // not in the pure registry
        let id_main = Id::new(module, 0);
        let id_r = Id::new(module, 1);

        let compute_call = TExpr::new(
            at(10),
            ExprKind::App {
                func: Box::new(TExpr::new(at(11), ExprKind::Prim(println_prim))),
                args: vec![unit_texpr(12)],
            },
        );
        let record = TExpr::new(
            at(20),
            ExprKind::Record(vec![
                RecordField { name: field_a, value: TExpr::new(at(21), ExprKind::Const), mutable: false },
                RecordField { name: field_b, value: compute_call, mutable: false },
            ]),
        );
        let read = TExpr::new(
            at(30),
            ExprKind::Field { target: Box::new(TExpr::new(at(31), ExprKind::Var(Some(id_r)))), field: field_a },
        );
        let outer = TExpr::new(
            at(0),
            ExprKind::Let { pat: Pattern::Var(id_r), value: Box::new(record), body: Box::new(read) },
        );

        let unit = CompilationUnit {
            name: module,
            bindings: vec![TopBinding {
                recursive: false,
                name: Some(interner.intern("main")),
                pat: Pattern::Var(id_main),
                value: outer,
            }],
            signature: None,
            label: husk_core::Label::default(),
        };

        let warnings = run(unit, interner);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    /// `let rec loop = loop` — a self-referential recursive binding — must
    /// not be misreported dead: it's still the module's own exported root,
    /// and the solver must resolve the resulting single-node cycle.
    #[test]
    fn recursive_self_reference_no_false_positive() {
        let mut interner = Interner::new();
        let module = ModuleName(interner.intern("m"));
        let id_loop = Id::new(module, 0);

        let unit = CompilationUnit {
            name: module,
            bindings: vec![TopBinding {
                recursive: true,
                name: Some(interner.intern("loop")),
                pat: Pattern::Var(id_loop),
                value: TExpr::new(at(0), ExprKind::Var(Some(id_loop))),
            }],
            signature: None,
            label: husk_core::Label::default(),
        };

        let warnings = run(unit, interner);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    /// `match x with Some v -> v + 1 | None -> 0` where `x = Some 3`: no
    /// warning — the match arm body is live and `x` is live via
    /// `controlledByPat`.
    #[test]
    fn match_arms_and_scrutinee_live() {
        let mut interner = Interner::new();
        let module = ModuleName(interner.intern("m"));
        let some_ctor = interner.intern("Some");
        let none_ctor = interner.intern("None");
        let add = interner.intern("%addint");
        let id_main = Id::new(module, 0);
        let id_x = Id::new(module, 1);
        let id_v = Id::new(module, 2);

        let some_three = TExpr::new(
            at(10),
            ExprKind::Construct { ctor: some_ctor, args: vec![TExpr::new(at(11), ExprKind::Const)] },
        );
        let some_arm_body = TExpr::new(
            at(20),
            ExprKind::App {
                func: Box::new(TExpr::new(at(21), ExprKind::Prim(add))),
                args: vec![TExpr::new(at(22), ExprKind::Var(Some(id_v))), TExpr::new(at(23), ExprKind::Const)],
            },
        );
        let match_expr = TExpr::new(
            at(30),
            ExprKind::Match {
                scrutinee: Box::new(TExpr::new(at(31), ExprKind::Var(Some(id_x)))),
                arms: vec![
                    MatchArm {
                        pat: Pattern::Construct { ctor: some_ctor, args: vec![Pattern::Var(id_v)] },
                        guard: None,
                        body: some_arm_body,
                    },
                    MatchArm {
                        pat: Pattern::Construct { ctor: none_ctor, args: vec![] },
                        guard: None,
                        body: TExpr::new(at(40), ExprKind::Const),
                    },
                ],
            },
        );
        let outer = TExpr::new(
            at(0),
            ExprKind::Let { pat: Pattern::Var(id_x), value: Box::new(some_three), body: Box::new(match_expr) },
        );

        let unit = CompilationUnit {
            name: module,
            bindings: vec![TopBinding {
                recursive: false,
                name: Some(interner.intern("main")),
                pat: Pattern::Var(id_main),
                value: outer,
            }],
            signature: None,
            label: husk_core::Label::default(),
        };

        let warnings = run(unit, interner);
        assert!(warnings.is_empty(), "{warnings:?}");
    }
}
