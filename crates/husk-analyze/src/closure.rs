//! Closure solver: iterates the constraint system emitted by
//! [`crate::constrain`] to a fixed point, yielding `label -> VS`,
//! `Id -> VS`, `Mem -> VS`, and the side-effect set.

use std::collections::{HashMap, HashSet};

use husk_core::{Id, Label, Pattern, Symbol};

use crate::constrain::{self, ClosureSeed, Generator, PatternBind, Reduction};
use crate::error::Error;
use crate::preprocess::{NodeShape, Program};
use crate::value::{AbstractValue, CtorTag, ValueSet};

/// The solved closure: the expression and identifier value sets, plus the
/// `Mem` table for mutable record fields.
#[derive(Debug, Default)]
pub struct ClosureMap {
    pub labels: HashMap<Label, ValueSet>,
    pub idents: HashMap<Id, ValueSet>,
    pub mem: HashMap<(Label, Symbol), ValueSet>,
    pub side_effects: HashSet<Label>,
}

impl ClosureMap {
    pub fn expr(&self, l: Label) -> &ValueSet {
        self.labels.get(&l).unwrap_or(&ValueSet::Empty)
    }

    pub fn expr_mut(&mut self, l: Label) -> &mut ValueSet {
        self.labels.entry(l).or_default()
    }

    pub fn id(&self, id: Id) -> &ValueSet {
        self.idents.get(&id).unwrap_or(&ValueSet::Empty)
    }

    pub fn id_mut(&mut self, id: Id) -> &mut ValueSet {
        self.idents.entry(id).or_default()
    }

    pub fn mem(&self, l: Label, field: Symbol) -> &ValueSet {
        self.mem.get(&(l, field)).unwrap_or(&ValueSet::Empty)
    }

    pub fn mem_mut(&mut self, l: Label, field: Symbol) -> &mut ValueSet {
        self.mem.entry((l, field)).or_default()
    }

    pub fn has_side_effect(&self, l: Label) -> bool {
        self.side_effects.contains(&l)
    }
}

impl From<ClosureSeed> for ClosureMap {
    fn from(seed: ClosureSeed) -> Self {
        ClosureMap { labels: seed.labels, idents: seed.idents, mem: seed.mem, side_effects: seed.side_effects }
    }
}

/// A `target.field` read site, precomputed once since the AST doesn't
/// change across solver rounds.
struct FieldRead {
    label: Label,
    target: Label,
    field: Symbol,
}

struct FieldWrite {
    target: Label,
    field: Symbol,
    value: Label,
}

pub fn solve(program: &Program, generator: Generator<'_>) -> Result<ClosureMap, Error> {
    let mut map = ClosureMap::from(generator.closure);
    let mut reductions = generator.reductions;
    let mut seen: HashSet<ReductionKey> = reductions.iter().map(ReductionKey::of).collect();
    let pattern_binds = generator.pattern_binds;

    let mut field_reads = Vec::new();
    let mut field_writes = Vec::new();
    for label in program.all_labels() {
        match &program.node(label).shape {
            NodeShape::Field { target, field } => {
                field_reads.push(FieldRead { label, target: *target, field: *field });
            }
            NodeShape::SetField { target, field, value } => {
                field_writes.push(FieldWrite { target: *target, field: *field, value: *value });
            }
            _ => {}
        }
    }

    loop {
        let mut changed = false;
        changed |= resolve_indirections(&mut map);
        changed |= resolve_patterns(program, &mut map, &pattern_binds);
        changed |= resolve_fields(program, &mut map, &field_reads, &field_writes);
        changed |= resolve_reductions(program, &mut map, &mut reductions, &mut seen);
        if !changed {
            break;
        }
    }

    Ok(map)
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
struct ReductionKey(Label, Label, Label, Vec<Label>);

impl ReductionKey {
    fn of(r: &Reduction) -> Self {
        ReductionKey(r.result, r.func, r.arg, r.rest.clone())
    }
}

/// Folds `ExprRef`/`IdRef` indirections into the sets that contain them.
fn resolve_indirections(map: &mut ClosureMap) -> bool {
    let mut changed = false;

    for l in map.labels.keys().copied().collect::<Vec<_>>() {
        let refs = indirections_of(map.labels.get(&l).unwrap());
        for target in refs {
            let addition = resolve_indirect(map, target);
            if map.labels.get_mut(&l).unwrap().join(&addition) {
                changed = true;
            }
        }
    }

    for id in map.idents.keys().copied().collect::<Vec<_>>() {
        let refs = indirections_of(map.idents.get(&id).unwrap());
        for target in refs {
            let addition = resolve_indirect(map, target);
            if map.idents.get_mut(&id).unwrap().join(&addition) {
                changed = true;
            }
        }
    }

    for key in map.mem.keys().copied().collect::<Vec<_>>() {
        let refs = indirections_of(map.mem.get(&key).unwrap());
        for target in refs {
            let addition = resolve_indirect(map, target);
            if map.mem.get_mut(&key).unwrap().join(&addition) {
                changed = true;
            }
        }
    }

    changed
}

#[derive(Clone, Copy)]
enum Indirect {
    Expr(Label),
    Id(Id),
}

fn indirections_of(vs: &ValueSet) -> Vec<Indirect> {
    vs.iter()
        .filter_map(|v| match v {
            AbstractValue::ExprRef(l) => Some(Indirect::Expr(*l)),
            AbstractValue::IdRef(id) => Some(Indirect::Id(*id)),
            _ => None,
        })
        .collect()
}

fn resolve_indirect(map: &ClosureMap, target: Indirect) -> ValueSet {
    match target {
        Indirect::Expr(l) => map.expr(l).clone(),
        Indirect::Id(id) => map.id(id).clone(),
    }
}

/// Resolves every queued [`PatternBind`] against the current closure map.
fn resolve_patterns(program: &Program, map: &mut ClosureMap, binds: &[PatternBind]) -> bool {
    let mut changed = false;
    for bind in binds {
        let source_vs = map.expr(bind.source).clone();
        bind_pattern(program, map, &bind.pat, &source_vs, &mut changed);
    }
    changed
}

/// Pattern binding. `vs` is the current value set of whatever the pattern
/// is matched against.
fn bind_pattern(program: &Program, map: &mut ClosureMap, pat: &Pattern, vs: &ValueSet, changed: &mut bool) {
    match pat {
        Pattern::Wildcard | Pattern::Const => {}
        Pattern::Var(id) => {
            *changed |= map.id_mut(*id).join(vs);
        }
        Pattern::Alias(inner, id) => {
            *changed |= map.id_mut(*id).join(vs);
            bind_pattern(program, map, inner, vs, changed);
        }
        Pattern::Or(a, b) => {
            bind_pattern(program, map, a, vs, changed);
            bind_pattern(program, map, b, vs, changed);
        }
        Pattern::Array(pats) => bind_top(map, &Pattern::Tuple(pats.clone()), changed),
        Pattern::Lazy(inner) => bind_top(map, inner, changed),
        Pattern::Tuple(pats) => {
            if vs.is_top() {
                bind_top(map, &Pattern::Tuple(pats.clone()), changed);
                return;
            }
            for v in vs.iter() {
                if let AbstractValue::Ctor(label) = v {
                    if let Some((CtorTag::Tuple, children)) = constrain::ctor_tag_of(program, *label) {
                        for (sub, child_label) in pats.iter().zip(children.iter()) {
                            let child_vs = map.expr(*child_label).clone();
                            bind_pattern(program, map, sub, &child_vs, changed);
                        }
                    }
                } else if matches!(v, AbstractValue::Unknown) {
                    bind_top(map, &Pattern::Tuple(pats.clone()), changed);
                }
            }
        }
        Pattern::Construct { ctor, args } => {
            if vs.is_top() {
                bind_top(map, pat, changed);
                return;
            }
            for v in vs.iter() {
                match v {
                    AbstractValue::Ctor(label) => {
                        if let Some((CtorTag::Construct(tag), children)) = constrain::ctor_tag_of(program, *label) {
                            if tag == *ctor {
                                for (sub, child_label) in args.iter().zip(children.iter()) {
                                    let child_vs = map.expr(*child_label).clone();
                                    bind_pattern(program, map, sub, &child_vs, changed);
                                }
                            }
                        }
                    }
                    AbstractValue::Unknown => bind_top(map, pat, changed),
                    _ => {}
                }
            }
        }
        Pattern::Variant { tag, arg } => {
            if vs.is_top() {
                bind_top(map, pat, changed);
                return;
            }
            for v in vs.iter() {
                match v {
                    AbstractValue::Ctor(label) => {
                        if let Some((CtorTag::Variant(vtag), children)) = constrain::ctor_tag_of(program, *label) {
                            if vtag == *tag {
                                if let (Some(sub), Some(child_label)) = (arg, children.first()) {
                                    let child_vs = map.expr(*child_label).clone();
                                    bind_pattern(program, map, sub, &child_vs, changed);
                                }
                            }
                        }
                    }
                    AbstractValue::Unknown => bind_top(map, pat, changed),
                    _ => {}
                }
            }
        }
        Pattern::Record(fields) => {
            if vs.is_top() {
                bind_top(map, pat, changed);
                return;
            }
            for v in vs.iter() {
                match v {
                    AbstractValue::Ctor(label) => {
                        for (name, sub) in fields {
                            let field_vs = if constrain::record_field_mutable(program, *label, *name) {
                                map.mem(*label, *name).clone()
                            } else if let Some(child) = constrain::record_field_label(program, *label, *name) {
                                map.expr(child).clone()
                            } else {
                                ValueSet::Empty
                            };
                            bind_pattern(program, map, sub, &field_vs, changed);
                        }
                    }
                    AbstractValue::Unknown => bind_top(map, pat, changed),
                    _ => {}
                }
            }
        }
    }
}

/// Binds every variable under `pat` to `⊤`, used when the scrutinee is
/// itself `⊤` or an unresolved external value.
fn bind_top(map: &mut ClosureMap, pat: &Pattern, changed: &mut bool) {
    let top = ValueSet::Top;
    match pat {
        Pattern::Wildcard | Pattern::Const => {}
        Pattern::Var(id) => *changed |= map.id_mut(*id).join(&top),
        Pattern::Alias(inner, id) => {
            *changed |= map.id_mut(*id).join(&top);
            bind_top(map, inner, changed);
        }
        Pattern::Tuple(pats) | Pattern::Array(pats) => {
            for p in pats {
                bind_top(map, p, changed);
            }
        }
        Pattern::Construct { args, .. } => {
            for p in args {
                bind_top(map, p, changed);
            }
        }
        Pattern::Variant { arg, .. } => {
            if let Some(p) = arg {
                bind_top(map, p, changed);
            }
        }
        Pattern::Record(fields) => {
            for (_, p) in fields {
                bind_top(map, p, changed);
            }
        }
        Pattern::Or(a, b) => {
            bind_top(map, a, changed);
            bind_top(map, b, changed);
        }
        Pattern::Lazy(inner) => bind_top(map, inner, changed),
    }
}

/// Resolves queued field reads and field writes against the current
/// closure map. A record's concrete `Ctor` values are looked up from the
/// AST index via `program` to find the field's child label (immutable) or
/// `Mem` cell (mutable).
fn resolve_fields(program: &Program, map: &mut ClosureMap, reads: &[FieldRead], writes: &[FieldWrite]) -> bool {
    let mut changed = false;

    for write in writes {
        let targets: Vec<(Label, Symbol)> = map
            .expr(write.target)
            .iter()
            .filter_map(|v| match v {
                AbstractValue::Mutable(l, f) if *f == write.field => Some((*l, *f)),
                _ => None,
            })
            .collect();
        let value_vs = map.expr(write.value).clone();
        for (l, f) in targets {
            if map.mem_mut(l, f).join(&value_vs) {
                changed = true;
            }
        }
    }

    for read in reads {
        let record_labels: Vec<Label> = map
            .expr(read.target)
            .iter()
            .filter_map(|v| match v {
                AbstractValue::Ctor(l) => Some(*l),
                _ => None,
            })
            .collect();
        for l in record_labels {
            if constrain::record_field_mutable(program, l, read.field) {
                let mem_vs = map.mem(l, read.field).clone();
                if map.expr_mut(read.label).join(&mem_vs) {
                    changed = true;
                }
            } else if let Some(child) = constrain::record_field_label(program, l, read.field) {
                let child_vs = map.expr(child).clone();
                if map.expr_mut(read.label).join(&child_vs) {
                    changed = true;
                }
            }
        }
        if map.expr(read.target).is_top() && map.expr_mut(read.label).make_top() {
            changed = true;
        }
    }

    changed
}

/// Resolution for primitive arity checks.
fn prim_total_args(reduction: &Reduction) -> usize {
    1 + reduction.rest.len()
}

fn resolve_reductions(
    program: &Program,
    map: &mut ClosureMap,
    reductions: &mut Vec<Reduction>,
    seen: &mut HashSet<ReductionKey>,
) -> bool {
    let mut changed = false;
    let mut new_reductions = Vec::new();

    let snapshot: Vec<Reduction> = reductions.clone();
    for reduction in &snapshot {
        let func_vs = map.expr(reduction.func).clone();

        if func_vs.is_top() {
            if map.expr_mut(reduction.result).make_top() {
                changed = true;
            }
            if map.expr_mut(reduction.arg).make_top() {
                changed = true;
            }
            for r in &reduction.rest {
                if map.expr_mut(*r).make_top() {
                    changed = true;
                }
            }
            continue;
        }

        for value in func_vs.iter() {
            match value {
                AbstractValue::Unknown => {
                    if map.expr_mut(reduction.result).make_top() {
                        changed = true;
                    }
                    if map.expr_mut(reduction.arg).make_top() {
                        changed = true;
                    }
                    for r in &reduction.rest {
                        if map.expr_mut(*r).make_top() {
                            changed = true;
                        }
                    }
                }
                AbstractValue::Fn(fl) => {
                    if let NodeShape::Fun(desc) = &program.node(*fl).shape {
                        let arg_vs = map.expr(reduction.arg).clone();
                        if map.id_mut(desc.param).join(&arg_vs) {
                            changed = true;
                        }
                        for (pat, body_label) in &desc.bodies {
                            bind_pattern(program, map, pat, &arg_vs, &mut changed);
                            if reduction.rest.is_empty() {
                                let body_vs = map.expr(*body_label).clone();
                                if map.expr_mut(reduction.result).join(&body_vs) {
                                    changed = true;
                                }
                            } else {
                                let mut rest_iter = reduction.rest.iter().copied();
                                let next_arg = rest_iter.next().unwrap();
                                let next_rest: Vec<Label> = rest_iter.collect();
                                let candidate = Reduction {
                                    result: reduction.result,
                                    func: *body_label,
                                    arg: next_arg,
                                    rest: next_rest,
                                };
                                let key = ReductionKey::of(&candidate);
                                if seen.insert(key) {
                                    new_reductions.push(candidate);
                                    changed = true;
                                }
                            }
                        }
                    }
                }
                AbstractValue::PartialApp(func_label, existing) => {
                    let mut combined = existing.clone();
                    combined.push(reduction.arg);
                    combined.extend(reduction.rest.iter().copied());
                    let mut it = combined.into_iter();
                    if let Some(first) = it.next() {
                        let candidate = Reduction {
                            result: reduction.result,
                            func: *func_label,
                            arg: first,
                            rest: it.collect(),
                        };
                        let key = ReductionKey::of(&candidate);
                        if seen.insert(key) {
                            new_reductions.push(candidate);
                            changed = true;
                        }
                    }
                }
                AbstractValue::Prim(name) => {
                    let resolved = program.interner.try_resolve(*name);
                    let total = prim_total_args(reduction);
                    match resolved.and_then(crate::constrain::primitives::arity) {
                        Some(arity) if total < arity => {
                            let mut args = vec![reduction.arg];
                            args.extend(reduction.rest.iter().copied());
                            if map.expr_mut(reduction.result).insert(AbstractValue::PartialApp(reduction.func, args)) {
                                changed = true;
                            }
                        }
                        _ => {
                            let pure = resolved.is_some_and(crate::constrain::primitives::is_pure_name);
                            if !pure {
                                map.side_effects.insert(reduction.result);
                                if map.expr_mut(reduction.result).make_top() {
                                    changed = true;
                                }
                                if map.expr_mut(reduction.arg).make_top() {
                                    changed = true;
                                }
                                for r in &reduction.rest {
                                    if map.expr_mut(*r).make_top() {
                                        changed = true;
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if !new_reductions.is_empty() {
        reductions.extend(new_reductions);
    }

    changed
}
