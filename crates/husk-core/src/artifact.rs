//! Loading of the typed-AST artifact. A real host compiler would hand
//! `husk` a richer, compiler-internal representation; this is the
//! concrete, JSON-friendly stand-in a standalone crate actually reads
//! from disk.

use crate::{CompilationUnit, Interner};

/// One input file: a module's typed tree plus the symbol table its
/// `Symbol` handles index into. The symbol table travels with the unit
/// because `Symbol(u32)` is only meaningful relative to the strings that
/// produced it — two units analyzed together must share one [`Interner`],
/// since cross-module `ModuleAccess` compares `Symbol`s directly.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Artifact {
    pub unit: CompilationUnit,
    /// Interned strings in `Symbol` order: `strings[sym.as_u32()]` is the
    /// string `sym` denotes.
    pub strings: Vec<String>,
}

/// Parse one compilation unit's artifact from its JSON text.
pub fn parse_artifact(json: &str) -> Result<Artifact, serde_json::Error> {
    serde_json::from_str(json)
}

/// Merges a batch of artifacts into one shared interner and the list of
/// compilation units it indexes, re-keying each unit's `Symbol`s so the
/// same string interns to the same handle across every unit — cross-module
/// access requires comparable `Symbol`s program-wide, but each artifact was
/// produced independently and so carries its own zero-based symbol table.
pub fn merge_artifacts(artifacts: Vec<Artifact>) -> (Vec<CompilationUnit>, Interner) {
    let mut interner = Interner::new();
    let units = artifacts
        .into_iter()
        .map(|artifact| {
            let remap: Vec<crate::Symbol> =
                artifact.strings.iter().map(|s| interner.intern(s)).collect();
            remap_unit(artifact.unit, &remap)
        })
        .collect();
    (units, interner)
}

fn remap_unit(mut unit: CompilationUnit, remap: &[crate::Symbol]) -> CompilationUnit {
    unit.name = crate::ModuleName(remap_symbol(unit.name.0, remap));
    if let Some(sig) = &mut unit.signature {
        for s in sig.iter_mut() {
            *s = remap_symbol(*s, remap);
        }
    }
    for binding in &mut unit.bindings {
        if let Some(name) = &mut binding.name {
            *name = remap_symbol(*name, remap);
        }
        remap_pattern(&mut binding.pat, remap);
        remap_expr(&mut binding.value, remap);
    }
    unit
}

fn remap_symbol(sym: crate::Symbol, remap: &[crate::Symbol]) -> crate::Symbol {
    remap[sym.as_u32() as usize]
}

/// Remaps the `ModuleName` symbol embedded in an `Id`. An `Id`'s stamp is
/// only unique within its own module's local numbering, but its `module`
/// field is a `Symbol` from the artifact it was declared in, and so needs
/// the same per-artifact remap as every other `Symbol` — cross-module
/// access compares `Id`s program-wide.
fn remap_id(id: crate::Id, remap: &[crate::Symbol]) -> crate::Id {
    crate::Id { module: crate::ModuleName(remap_symbol(id.module.0, remap)), stamp: id.stamp }
}

fn remap_pattern(pat: &mut crate::Pattern, remap: &[crate::Symbol]) {
    use crate::Pattern::*;
    match pat {
        Wildcard | Const => {}
        Var(id) => *id = remap_id(*id, remap),
        Alias(inner, id) => {
            remap_pattern(inner, remap);
            *id = remap_id(*id, remap);
        }
        Lazy(inner) => remap_pattern(inner, remap),
        Tuple(pats) | Array(pats) => pats.iter_mut().for_each(|p| remap_pattern(p, remap)),
        Construct { ctor, args } => {
            *ctor = remap_symbol(*ctor, remap);
            args.iter_mut().for_each(|p| remap_pattern(p, remap));
        }
        Variant { tag, arg } => {
            *tag = remap_symbol(*tag, remap);
            if let Some(p) = arg {
                remap_pattern(p, remap);
            }
        }
        Record(fields) => {
            for (name, p) in fields.iter_mut() {
                *name = remap_symbol(*name, remap);
                remap_pattern(p, remap);
            }
        }
        Or(a, b) => {
            remap_pattern(a, remap);
            remap_pattern(b, remap);
        }
    }
}

fn remap_expr(expr: &mut crate::TExpr, remap: &[crate::Symbol]) {
    use crate::ExprKind::*;
    match &mut expr.kind {
        Var(id) => {
            if let Some(id) = id {
                *id = remap_id(*id, remap);
            }
        }
        Const => {}
        Let { pat, value, body } => {
            remap_pattern(pat, remap);
            remap_expr(value, remap);
            remap_expr(body, remap);
        }
        Fun { param, cases } => {
            *param = remap_id(*param, remap);
            for case in cases {
                remap_pattern(&mut case.pat, remap);
                remap_expr(&mut case.body, remap);
            }
        }
        App { func, args } => {
            remap_expr(func, remap);
            args.iter_mut().for_each(|a| remap_expr(a, remap));
        }
        Match { scrutinee, arms } => {
            remap_expr(scrutinee, remap);
            remap_arms(arms, remap);
        }
        Try { body, arms } => {
            remap_expr(body, remap);
            remap_arms(arms, remap);
        }
        Tuple(items) | ArrayLit(items) => items.iter_mut().for_each(|e| remap_expr(e, remap)),
        Record(fields) => {
            for f in fields {
                f.name = remap_symbol(f.name, remap);
                remap_expr(&mut f.value, remap);
            }
        }
        Construct { ctor, args } => {
            *ctor = remap_symbol(*ctor, remap);
            args.iter_mut().for_each(|a| remap_expr(a, remap));
        }
        Variant { tag, arg } => {
            *tag = remap_symbol(*tag, remap);
            if let Some(a) = arg {
                remap_expr(a, remap);
            }
        }
        Field { target, field } => {
            *field = remap_symbol(*field, remap);
            remap_expr(target, remap);
        }
        SetField { target, field, value } => {
            *field = remap_symbol(*field, remap);
            remap_expr(target, remap);
            remap_expr(value, remap);
        }
        Sequence(a, b) => {
            remap_expr(a, remap);
            remap_expr(b, remap);
        }
        If { cond, then_branch, else_branch } => {
            remap_expr(cond, remap);
            remap_expr(then_branch, remap);
            if let Some(e) = else_branch {
                remap_expr(e, remap);
            }
        }
        While { cond, body } => {
            remap_expr(cond, remap);
            remap_expr(body, remap);
        }
        For { index, lo, hi, body, .. } => {
            *index = remap_id(*index, remap);
            remap_expr(lo, remap);
            remap_expr(hi, remap);
            remap_expr(body, remap);
        }
        Prim(name) => *name = remap_symbol(*name, remap),
        Raise(inner) | Lazy(inner) => remap_expr(inner, remap),
        ModuleAccess { module, member } => {
            module.0 = remap_symbol(module.0, remap);
            *member = remap_symbol(*member, remap);
        }
    }
}

fn remap_arms(arms: &mut [crate::MatchArm], remap: &[crate::Symbol]) {
    for arm in arms {
        remap_pattern(&mut arm.pat, remap);
        if let Some(guard) = &mut arm.guard {
            remap_expr(guard, remap);
        }
        remap_expr(&mut arm.body, remap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{Id, ModuleName, SourceLoc, Span};
    use crate::{ExprKind, Pattern, TExpr, TopBinding};
    use pretty_assertions::assert_eq;

    fn loc() -> SourceLoc {
        SourceLoc { file: "a.ml".to_string(), span: Span::new(0, 1) }
    }

    #[test]
    fn parses_minimal_unit() {
        let json = r#"{
            "unit": {
                "name": 0,
                "bindings": [],
                "signature": null
            },
            "strings": ["Main"]
        }"#;
        let artifact = parse_artifact(json).expect("valid artifact json");
        assert_eq!(artifact.strings, vec!["Main".to_string()]);
    }

    #[test]
    fn merge_remaps_symbols_to_a_shared_table() {
        let mut interner_a = Interner::new();
        let x = interner_a.intern("x");
        let unit_a = CompilationUnit {
            name: ModuleName(interner_a.intern("A")),
            bindings: vec![TopBinding {
                recursive: false,
                name: Some(x),
                pat: Pattern::Var(Id { module: ModuleName(interner_a.intern("A")), stamp: 0 }),
                value: TExpr::new(loc(), ExprKind::Const),
            }],
            signature: None,
            label: Default::default(),
        };
        let artifact_a = Artifact { unit: unit_a, strings: vec!["A".to_string(), "x".to_string()] };

        let mut interner_b = Interner::new();
        let unit_b = CompilationUnit {
            name: ModuleName(interner_b.intern("B")),
            bindings: vec![],
            signature: None,
            label: Default::default(),
        };
        let artifact_b = Artifact { unit: unit_b, strings: vec!["B".to_string()] };

        let (units, interner) = merge_artifacts(vec![artifact_a, artifact_b]);
        assert_eq!(units.len(), 2);
        assert_eq!(interner.resolve(units[0].name.0), "A");
        assert_eq!(interner.resolve(units[1].name.0), "B");

        // The bound pattern's `Id.module` symbol must be remapped onto the
        // same shared handle as the unit's own (separately remapped) name,
        // not left pointing at artifact_a's local, now-stale symbol table.
        let Pattern::Var(id) = &units[0].bindings[0].pat else { panic!("expected Var pattern") };
        assert_eq!(id.module, units[0].name);
    }
}
