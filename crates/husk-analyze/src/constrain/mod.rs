//! Constraint generator.
//!
//! Emits, for every label in the program, an initial abstract-value
//! constraint and a side-effect bit. Constraints that depend on *which*
//! concrete values a label ends up holding (pattern binding against a
//! scrutinee, application) cannot be resolved here — they're queued as
//! [`Reduction`]s and [`PatternBind`]s for the closure solver (`closure.rs`)
//! to iterate to a fixed point.

pub mod primitives;

use std::collections::HashMap;

use husk_core::{Id, Label, Pattern, Symbol};

use crate::preprocess::{NodeShape, Program};
use crate::value::{AbstractValue, CtorTag, ValueSet};

/// The closure map's initial seed: direct constraints the generator can
/// state outright, before any fixed-point iteration.
#[derive(Debug, Default)]
pub struct ClosureSeed {
    pub labels: HashMap<Label, ValueSet>,
    pub idents: HashMap<Id, ValueSet>,
    /// Mutable record field cells, keyed by the record's defining label and
    /// the field name.
    pub mem: HashMap<(Label, Symbol), ValueSet>,
    pub side_effects: std::collections::HashSet<Label>,
}

impl ClosureSeed {
    pub fn expr_mut(&mut self, l: Label) -> &mut ValueSet {
        self.labels.entry(l).or_default()
    }

    pub fn id_mut(&mut self, id: Id) -> &mut ValueSet {
        self.idents.entry(id).or_default()
    }

    pub fn mem_mut(&mut self, l: Label, field: Symbol) -> &mut ValueSet {
        self.mem.entry((l, field)).or_default()
    }

    pub fn mark_effect(&mut self, l: Label) {
        self.side_effects.insert(l);
    }

    pub fn value_count(&self) -> usize {
        self.labels.len() + self.idents.len() + self.mem.len()
    }
}

/// A pending `f a rest...` application, awaiting resolution by the closure
/// solver once `f`'s concrete value set is known.
#[derive(Debug, Clone)]
pub struct Reduction {
    /// Where the fully-applied result lands.
    pub result: Label,
    pub func: Label,
    pub arg: Label,
    pub rest: Vec<Label>,
}

/// A pending `pattern ~ C[source]` binding, awaiting concrete values to
/// project against.
#[derive(Debug, Clone)]
pub struct PatternBind {
    pub pat: Pattern,
    pub source: Label,
}

pub struct Generator<'p> {
    program: &'p Program,
    pub closure: ClosureSeed,
    pub reductions: Vec<Reduction>,
    pub pattern_binds: Vec<PatternBind>,
}

impl<'p> Generator<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            closure: ClosureSeed::default(),
            reductions: Vec::new(),
            pattern_binds: Vec::new(),
        }
    }

    pub fn pending_reductions(&self) -> usize {
        self.reductions.len()
    }

    pub fn run(&mut self) {
        for unit in &self.program.units {
            for binding in &unit.bindings {
                self.pattern_binds.push(PatternBind {
                    pat: binding.pat.clone(),
                    source: binding.value.label,
                });
            }
        }

        let labels: Vec<Label> = self.program.all_labels().collect();
        for label in labels {
            self.generate_for_label(label);
        }
    }

    fn queue_pattern_bind(&mut self, pat: Pattern, source: Label) {
        self.pattern_binds.push(PatternBind { pat, source });
    }

    /// Binds every variable in `pat` straight to `⊤`, for scrutinees that
    /// have no tracked source label — used for exception patterns, whose
    /// raised value isn't flow-tracked.
    fn bind_pattern_to_top(&mut self, pat: &Pattern) {
        match pat {
            Pattern::Wildcard | Pattern::Const => {}
            Pattern::Var(id) => {
                self.closure.id_mut(*id).make_top();
            }
            Pattern::Alias(inner, id) => {
                self.closure.id_mut(*id).make_top();
                self.bind_pattern_to_top(inner);
            }
            Pattern::Tuple(pats) | Pattern::Array(pats) => {
                for p in pats {
                    self.bind_pattern_to_top(p);
                }
            }
            Pattern::Construct { args, .. } => {
                for p in args {
                    self.bind_pattern_to_top(p);
                }
            }
            Pattern::Variant { arg, .. } => {
                if let Some(p) = arg {
                    self.bind_pattern_to_top(p);
                }
            }
            Pattern::Record(fields) => {
                for (_, p) in fields {
                    self.bind_pattern_to_top(p);
                }
            }
            Pattern::Or(a, b) => {
                self.bind_pattern_to_top(a);
                self.bind_pattern_to_top(b);
            }
            Pattern::Lazy(inner) => self.bind_pattern_to_top(inner),
        }
    }

    fn generate_for_label(&mut self, label: Label) {
        let node = self.program.node(label);
        match node.shape.clone() {
            NodeShape::Var(Some(id)) => {
                self.closure.expr_mut(label).insert(AbstractValue::IdRef(id));
            }
            NodeShape::Var(None) => {
                self.closure.expr_mut(label).make_top();
            }
            NodeShape::Const => {}
            NodeShape::Let { pat, value, body } => {
                self.queue_pattern_bind(pat, value);
                self.closure.expr_mut(label).insert(AbstractValue::ExprRef(body));
            }
            NodeShape::Fun(_) => {
                self.closure.expr_mut(label).insert(AbstractValue::Fn(label));
            }
            NodeShape::App { func, args } => {
                let mut iter = args.into_iter();
                match iter.next() {
                    Some(first) => {
                        let rest: Vec<Label> = iter.collect();
                        self.reductions.push(Reduction { result: label, func, arg: first, rest });
                    }
                    None => {
                        self.closure.expr_mut(label).insert(AbstractValue::PartialApp(func, Vec::new()));
                    }
                }
            }
            NodeShape::Match { scrutinee, arms } => {
                for arm in arms {
                    self.queue_pattern_bind(arm.pat, scrutinee);
                    self.closure.expr_mut(label).insert(AbstractValue::ExprRef(arm.body));
                }
            }
            NodeShape::Try { body, arms } => {
                self.closure.expr_mut(label).insert(AbstractValue::ExprRef(body));
                for arm in arms {
                    self.bind_pattern_to_top(&arm.pat);
                    self.closure.expr_mut(label).insert(AbstractValue::ExprRef(arm.body));
                }
            }
            NodeShape::Tuple(_) | NodeShape::Record(_) | NodeShape::Construct { .. } | NodeShape::Variant { .. } => {
                self.closure.expr_mut(label).insert(AbstractValue::Ctor(label));
                if let NodeShape::Record(fields) = &self.program.node(label).shape {
                    for field in fields {
                        if field.mutable {
                            self.closure.expr_mut(label).insert(AbstractValue::Mutable(label, field.name));
                            self.closure.mem_mut(label, field.name).insert(AbstractValue::ExprRef(field.value));
                        }
                    }
                }
            }
            NodeShape::Field { .. } => {
                // Resolved by the closure solver once `C[target]`'s concrete
                // `Ctor` values are known — no seed-time constraint to emit.
            }
            NodeShape::SetField { .. } => {
                // The assignment side effect is unconditional; the actual
                // `Mem` write is resolved in `closure.rs` alongside `Field`.
                self.closure.mark_effect(label);
            }
            NodeShape::Sequence(_, b) => {
                self.closure.expr_mut(label).insert(AbstractValue::ExprRef(b));
            }
            NodeShape::If { then_branch, else_branch, .. } => {
                self.closure.expr_mut(label).insert(AbstractValue::ExprRef(then_branch));
                if let Some(e) = else_branch {
                    self.closure.expr_mut(label).insert(AbstractValue::ExprRef(e));
                }
            }
            NodeShape::While { .. } => {
                // A while loop's value is always unit; no data flows out.
            }
            NodeShape::For { index, .. } => {
                self.closure.id_mut(index).make_top();
            }
            NodeShape::Prim(name) => {
                self.closure.expr_mut(label).insert(AbstractValue::Prim(name));
            }
            NodeShape::Raise(_) => {
                self.closure.mark_effect(label);
            }
            NodeShape::ArrayLit(items) => {
                // Arrays are not element-tracked; every element escapes to
                // `⊤` rather than being indexed.
                for item in items {
                    self.closure.expr_mut(item).make_top();
                }
            }
            NodeShape::Lazy(inner) => {
                self.closure.expr_mut(label).insert(AbstractValue::ExprRef(inner));
            }
            NodeShape::ModuleAccess { module, member } => match resolve_module_member(self.program, module, member) {
                Some(id) => {
                    self.closure.expr_mut(label).insert(AbstractValue::IdRef(id));
                }
                None => {
                    self.closure.expr_mut(label).make_top();
                }
            },
            NodeShape::Module { .. } => {}
        }
    }
}

/// Resolves `module.member` to the bound `Id` exported by `module`, if
/// `module` is among the units this program knows about and exports
/// `member`. Shared by the constraint generator (value flow, via `IdRef`)
/// and the dependency collector (liveness flow, via a direct `Id` edge) so
/// both sides of the analysis agree on what a module access resolves to.
pub fn resolve_module_member(program: &Program, module: husk_core::ModuleName, member: Symbol) -> Option<Id> {
    let target_unit = program.units.iter().find(|u| u.name == module)?;
    match &program.try_node(target_unit.label)?.shape {
        NodeShape::Module { members, .. } => members.iter().find(|(name, _)| *name == member).map(|(_, id)| *id),
        _ => None,
    }
}

/// Looks up the constructor tag and children labels for a `Ctor(label)`
/// value by re-reading the defining node from the AST index — kept out of
/// the value itself to avoid duplicating data already in the index,
/// mirroring `Fn`'s use of the defining label as identity.
pub fn ctor_tag_of(program: &Program, label: Label) -> Option<(CtorTag, Vec<Label>)> {
    match &program.node(label).shape {
        NodeShape::Tuple(items) => Some((CtorTag::Tuple, items.clone())),
        NodeShape::Record(fields) => {
            Some((CtorTag::Record, fields.iter().map(|f| f.value).collect()))
        }
        NodeShape::Construct { ctor, args } => Some((CtorTag::Construct(*ctor), args.clone())),
        NodeShape::Variant { tag, arg } => {
            Some((CtorTag::Variant(*tag), arg.into_iter().copied().collect()))
        }
        _ => None,
    }
}

/// Field name/index lookup for a `Record`-shaped `Ctor`, used by field
/// access and assignment.
pub fn record_field_label(program: &Program, label: Label, field: Symbol) -> Option<Label> {
    match &program.node(label).shape {
        NodeShape::Record(fields) => fields.iter().find(|f| f.name == field).map(|f| f.value),
        _ => None,
    }
}

pub fn record_field_mutable(program: &Program, label: Label, field: Symbol) -> bool {
    match &program.node(label).shape {
        NodeShape::Record(fields) => fields.iter().any(|f| f.name == field && f.mutable),
        _ => false,
    }
}
