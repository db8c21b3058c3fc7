//! Value-dependency graph: translates the closure solver's fixed point
//! into a directed graph of [`FlowNode`]s whose edges carry monotone
//! `Live -> Live` transformers, to be solved by `solve.rs`.

use std::collections::HashMap;

use husk_core::{Id, Label, Symbol};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::closure::ClosureMap;
use crate::constrain;
use crate::liveness::{self, Live};
use crate::preprocess::{NodeShape, Program};
use crate::value::{AbstractValue, CtorTag};

/// A node in the dependency graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum FlowNode {
    Expr(Label),
    Id(Id),
    Mem(Label, Symbol),
    /// The ambient external world; any node with an edge from `Top` is
    /// conservatively live.
    Top,
}

/// A monotone `Live -> Live` edge transformer. Represented as data rather
/// than a boxed closure so the graph stays cheap to build and easy to
/// inspect in `--debug` dumps.
#[derive(Clone, Debug)]
pub enum Transformer {
    /// `λl. l`
    Identity,
    /// `λl. Func(l)` — wraps the target's demand as "result of calling me".
    WrapFunc,
    /// `WrapFunc` applied `n` times, for a curried call site with `n`
    /// arguments still to come — each pending argument adds one more
    /// layer of "this is the result of calling me" before the demand
    /// reaches the callee itself.
    WrapFuncN(usize),
    /// `λl. body(l)` — unwraps a `Func` demand into "my body must satisfy
    /// this".
    ExtractBody,
    /// `λl. field(tag, i)(l)` — extracts the i-th slot under `tag` from the
    /// source's own demand, for propagating a constructed value's demand
    /// down into the child that fills that slot.
    Field(CtorTag, usize),
    /// `λl. from_field(tag, i, l)` — injects the source's own demand into
    /// the i-th slot under `tag`, for propagating a field *read*'s demand
    /// down onto the larger record/variant it reads from.
    FromField(CtorTag, usize),
    /// `λl. if l is Bot then Bot else other` — any demand at all on a
    /// control-flow-only subexpression collapses to full demand.
    IfNotBot(Box<Live>),
    /// `λl. other`, ignoring the source entirely — used for edges from
    /// `Top`, whose own liveness is always `Top` regardless.
    Const(Box<Live>),
}

impl Transformer {
    pub fn apply(&self, l: &Live) -> Live {
        match self {
            Transformer::Identity => l.clone(),
            Transformer::WrapFunc => Live::func(l.clone()),
            Transformer::WrapFuncN(n) => (0..*n).fold(l.clone(), |acc, _| Live::func(acc)),
            Transformer::ExtractBody => l.body(),
            Transformer::Field(tag, i) => l.field(tag, *i),
            Transformer::FromField(tag, i) => Live::from_field(tag.clone(), *i, l.clone()),
            Transformer::IfNotBot(then) => l.ifnotbot(then),
            Transformer::Const(v) => (**v).clone(),
        }
    }
}

/// The solved dependency graph: a `petgraph` digraph over [`FlowNode`]s,
/// plus an index from node to its petgraph handle for edge lookups.
pub struct DepGraph {
    pub graph: DiGraph<FlowNode, Transformer>,
    pub index: HashMap<FlowNode, NodeIndex>,
    pub top: NodeIndex,
}

impl DepGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

struct Builder<'a> {
    program: &'a Program,
    closure: &'a ClosureMap,
    graph: DiGraph<FlowNode, Transformer>,
    index: HashMap<FlowNode, NodeIndex>,
    effect_memo: HashMap<Label, bool>,
}

impl<'a> Builder<'a> {
    fn get_or_insert(&mut self, n: FlowNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&n) {
            return idx;
        }
        let idx = self.graph.add_node(n);
        self.index.insert(n, idx);
        idx
    }

    fn edge(&mut self, src: FlowNode, dst: FlowNode, t: Transformer) {
        let s = self.get_or_insert(src);
        let d = self.get_or_insert(dst);
        self.graph.add_edge(s, d, t);
    }

    fn pin_top(&mut self, n: FlowNode) {
        self.edge(FlowNode::Top, n, Transformer::Const(Box::new(Live::Top)));
    }

    /// Whether evaluating `label` and its direct syntactic descendants may
    /// cause an observable side effect — used for the loop/if/while
    /// "taint the guard when the body may effect" rule.
    /// Does not follow function calls' callees (that would require an
    /// unbounded call-graph walk); a called function's own effects are
    /// already visible through the side-effect bit landing on the *call
    /// site*'s result label, which is itself a syntactic descendant.
    fn subtree_may_effect(&mut self, label: Label) -> bool {
        if let Some(&cached) = self.effect_memo.get(&label) {
            return cached;
        }
        // Break cycles conservatively: assume no effect until proven,
        // matching the lattice's Bot-is-default stance; a true self-effect
        // only reachable through a cycle is vanishingly rare for this
        // syntactic (non-call-following) walk.
        self.effect_memo.insert(label, false);

        let direct = self.closure.has_side_effect(label);
        let children = children_of(self.program, label);
        let result = direct || children.into_iter().any(|c| self.subtree_may_effect(c));
        self.effect_memo.insert(label, result);
        result
    }

    fn build(mut self) -> DepGraph {
        self.get_or_insert(FlowNode::Top);

        let labels: Vec<Label> = self.program.all_labels().collect();
        for label in &labels {
            self.build_for_label(*label);
        }

        for unit in &self.program.units {
            self.build_module(unit);
        }

        let top = self.get_or_insert(FlowNode::Top);
        DepGraph { graph: self.graph, index: self.index, top }
    }

    /// A compilation unit's own value is the program's externally observed
    /// root — a top-level binding with no further consumer in sight is
    /// still live because it is, by default, part of the unit's exported
    /// interface. Pinned `Top` directly, then projected onto each exported
    /// member via the module-structure edge (`edge Expr(module-label) ->
    /// Id(member)` with field extraction by position).
    fn build_module(&mut self, unit: &husk_core::CompilationUnit) {
        self.pin_top(FlowNode::Expr(unit.label));

        // Every top-level binding is a pattern match against its own
        // value, exactly like a `let`'s pattern against its bound
        // expression (§4.2 "Pattern binding"); the module-structure edge
        // below only carries demand as far as the bound `Id`, so each
        // binding still needs the same `Id -> Expr(value)` edge a `Let`
        // node gets from `bind_pattern_edges_for_let`.
        for binding in &unit.bindings {
            self.pattern_edges(binding.pat.clone(), binding.value.label);
        }

        let NodeShape::Module { members, signature, .. } = &self.program.node(unit.label).shape else {
            return;
        };
        for (i, (name, id)) in members.iter().enumerate() {
            let exported = signature.as_ref().map_or(true, |sig| sig.contains(name));
            if exported {
                self.edge(
                    FlowNode::Expr(unit.label),
                    FlowNode::Id(*id),
                    Transformer::Field(CtorTag::Module(unit.name), i),
                );
            }
        }
    }

    fn build_for_label(&mut self, label: Label) {
        if self.closure.has_side_effect(label) {
            self.pin_top(FlowNode::Expr(label));
        }
        // §7's conservative fallback cuts both ways: a label whose value
        // set the closure solver gave up and widened to `⊤` (an
        // unresolved external, a tainting primitive's operand, ...) has
        // itself "escaped to unknown external" and is pinned live for the
        // same reason `Var(None)` below is — without this, a tainting
        // primitive's arguments (closure-widened to `⊤` in
        // `closure::resolve_reductions`, never carried into the
        // dependency graph any other way) would read as dead.
        if self.closure.expr(label).is_top() {
            self.pin_top(FlowNode::Expr(label));
        }

        let shape = self.program.node(label).shape.clone();
        match shape {
            NodeShape::Var(Some(id)) => self.edge(FlowNode::Expr(label), FlowNode::Id(id), Transformer::Identity),
            NodeShape::Var(None) => self.pin_top(FlowNode::Expr(label)),
            NodeShape::Const => {}
            NodeShape::Let { pat, value, body } => {
                self.edge(FlowNode::Expr(label), FlowNode::Expr(body), Transformer::Identity);
                // Mirrors `build_match`'s scrutinee edge: a destructuring
                // pattern (tuple/record/construct/variant) observes its
                // value's shape even before any bound variable is itself
                // used, so the value must be demanded at least
                // `controlledByPat` — a plain variable pattern demands
                // `Bot` here, leaving the value's liveness entirely to the
                // per-variable pattern-bind edges below, unchanged from
                // before this edge existed.
                let pattern_demand = liveness::controlled_by_pat(&pat);
                self.edge(FlowNode::Expr(label), FlowNode::Expr(value), Transformer::IfNotBot(Box::new(pattern_demand)));
                self.bind_pattern_edges_for_let(label, value);
            }
            NodeShape::Fun(desc) => {
                for (_, body) in &desc.bodies {
                    self.edge(FlowNode::Expr(label), FlowNode::Expr(*body), Transformer::ExtractBody);
                }
            }
            NodeShape::App { func, args } => self.build_app(label, func, &args),
            NodeShape::Match { scrutinee, arms } => self.build_match(label, scrutinee, &arms),
            NodeShape::Try { body, arms } => {
                self.edge(FlowNode::Expr(label), FlowNode::Expr(body), Transformer::Identity);
                for arm in &arms {
                    self.edge(FlowNode::Expr(label), FlowNode::Expr(arm.body), Transformer::Identity);
                    if let Some(guard) = arm.guard {
                        self.edge(
                            FlowNode::Expr(label),
                            FlowNode::Expr(guard),
                            Transformer::IfNotBot(Box::new(Live::Top)),
                        );
                    }
                }
            }
            NodeShape::Tuple(items) => {
                for (i, child) in items.iter().enumerate() {
                    self.edge(FlowNode::Expr(label), FlowNode::Expr(*child), Transformer::Field(CtorTag::Tuple, i));
                }
            }
            NodeShape::Record(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if field.mutable {
                        // Mutable fields are read through `Mem`, whose own
                        // liveness is driven by field-read sites directly
                        // (see `NodeShape::Field` below); the record's own
                        // demand on the initializer only needs the shape.
                        self.edge(FlowNode::Mem(label, field.name), FlowNode::Expr(field.value), Transformer::Identity);
                    } else {
                        self.edge(
                            FlowNode::Expr(label),
                            FlowNode::Expr(field.value),
                            Transformer::Field(CtorTag::Record, i),
                        );
                    }
                }
            }
            NodeShape::Construct { ctor, args } => {
                for (i, child) in args.iter().enumerate() {
                    self.edge(
                        FlowNode::Expr(label),
                        FlowNode::Expr(*child),
                        Transformer::Field(CtorTag::Construct(ctor), i),
                    );
                }
            }
            NodeShape::Variant { tag, arg } => {
                if let Some(child) = arg {
                    self.edge(FlowNode::Expr(label), FlowNode::Expr(child), Transformer::Field(CtorTag::Variant(tag), 0));
                }
            }
            NodeShape::Field { target, field } => self.build_field_read(label, target, field),
            NodeShape::SetField { target, field, value } => self.build_set_field(label, target, field, value),
            NodeShape::Sequence(_, b) => self.edge(FlowNode::Expr(label), FlowNode::Expr(b), Transformer::Identity),
            NodeShape::If { cond, then_branch, else_branch } => {
                self.edge(FlowNode::Expr(label), FlowNode::Expr(then_branch), Transformer::Identity);
                if let Some(e) = else_branch {
                    self.edge(FlowNode::Expr(label), FlowNode::Expr(e), Transformer::Identity);
                }
                self.edge(FlowNode::Expr(label), FlowNode::Expr(cond), Transformer::IfNotBot(Box::new(Live::Top)));
                let branch_effect =
                    self.subtree_may_effect(then_branch) || else_branch.is_some_and(|e| self.subtree_may_effect(e));
                if branch_effect {
                    self.pin_top(FlowNode::Expr(cond));
                }
            }
            NodeShape::While { cond, body } => {
                if self.subtree_may_effect(body) {
                    self.pin_top(FlowNode::Expr(cond));
                    self.pin_top(FlowNode::Expr(body));
                }
            }
            NodeShape::For { index, lo, hi, up: _, body } => {
                if self.subtree_may_effect(body) {
                    self.pin_top(FlowNode::Expr(lo));
                    self.pin_top(FlowNode::Expr(hi));
                    self.pin_top(FlowNode::Expr(body));
                    self.pin_top(FlowNode::Id(index));
                }
            }
            NodeShape::Prim(_) => {}
            NodeShape::Raise(inner) => self.pin_top(FlowNode::Expr(inner)),
            NodeShape::ArrayLit(items) => {
                // Array elements are not index-tracked; every element is
                // pinned live.
                for item in items {
                    self.pin_top(FlowNode::Expr(item));
                }
            }
            NodeShape::Lazy(inner) => self.edge(FlowNode::Expr(label), FlowNode::Expr(inner), Transformer::Identity),
            NodeShape::ModuleAccess { module, member } => {
                match constrain::resolve_module_member(self.program, module, member) {
                    Some(id) => self.edge(FlowNode::Expr(label), FlowNode::Id(id), Transformer::Identity),
                    None => self.pin_top(FlowNode::Expr(label)),
                }
            }
            NodeShape::Module { .. } => {}
        }
    }

    fn bind_pattern_edges_for_let(&mut self, let_label: Label, value: Label) {
        let NodeShape::Let { pat, .. } = &self.program.node(let_label).shape else {
            return;
        };
        self.pattern_edges(pat.clone(), value);
    }

    /// Edges from each variable bound by `pat` back to whatever it was
    /// matched against, so that demand on the bound identifier propagates
    /// onto the matched slot of `source`, generalizing the `let`/match-arm
    /// pattern-binding rule to the dependency graph. Nested
    /// constructor/tuple/record patterns project through each concrete
    /// `Ctor` value the closure solver resolved for `source`, mirroring
    /// `closure::bind_pattern`'s traversal but emitting graph edges
    /// instead of joining value sets.
    fn pattern_edges(&mut self, pat: husk_core::Pattern, source: Label) {
        self.pattern_edges_inner(&pat, FlowNode::Expr(source));
    }

    fn pattern_edges_inner(&mut self, pat: &husk_core::Pattern, source: FlowNode) {
        use husk_core::Pattern;
        match pat {
            Pattern::Wildcard | Pattern::Const => {}
            Pattern::Var(id) => self.edge(FlowNode::Id(*id), source, Transformer::Identity),
            Pattern::Alias(inner, id) => {
                self.edge(FlowNode::Id(*id), source, Transformer::Identity);
                self.pattern_edges_inner(inner, source);
            }
            Pattern::Or(a, b) => {
                self.pattern_edges_inner(a, source);
                self.pattern_edges_inner(b, source);
            }
            Pattern::Array(_) | Pattern::Lazy(_) => {
                // No element/thunk tracking: the closure solver already
                // pins every bound variable to `⊤` directly, so no graph
                // edge is owed for soundness.
            }
            Pattern::Tuple(pats) => {
                let FlowNode::Expr(record) = source else { return };
                for rl in self.concrete_ctors(record) {
                    if let Some((CtorTag::Tuple, children)) = constrain::ctor_tag_of(self.program, rl) {
                        for (sub, child) in pats.iter().zip(children.iter()) {
                            self.pattern_edges_inner(sub, FlowNode::Expr(*child));
                        }
                    }
                }
            }
            Pattern::Construct { ctor, args } => {
                let FlowNode::Expr(record) = source else { return };
                for rl in self.concrete_ctors(record) {
                    if let Some((CtorTag::Construct(tag), children)) = constrain::ctor_tag_of(self.program, rl) {
                        if tag == *ctor {
                            for (sub, child) in args.iter().zip(children.iter()) {
                                self.pattern_edges_inner(sub, FlowNode::Expr(*child));
                            }
                        }
                    }
                }
            }
            Pattern::Variant { tag, arg } => {
                let FlowNode::Expr(record) = source else { return };
                let Some(sub) = arg else { return };
                for rl in self.concrete_ctors(record) {
                    if let Some((CtorTag::Variant(vtag), children)) = constrain::ctor_tag_of(self.program, rl) {
                        if vtag == *tag {
                            if let Some(child) = children.first() {
                                self.pattern_edges_inner(sub, FlowNode::Expr(*child));
                            }
                        }
                    }
                }
            }
            Pattern::Record(fields) => {
                let FlowNode::Expr(record) = source else { return };
                for rl in self.concrete_ctors(record) {
                    for (name, sub) in fields {
                        if constrain::record_field_mutable(self.program, rl, *name) {
                            self.pattern_edges_inner(sub, FlowNode::Mem(rl, *name));
                        } else if let Some(child) = constrain::record_field_label(self.program, rl, *name) {
                            self.pattern_edges_inner(sub, FlowNode::Expr(child));
                        }
                    }
                }
            }
        }
    }

    /// Every concrete `Ctor` label the closure solver resolved for `label`.
    fn concrete_ctors(&self, label: Label) -> Vec<Label> {
        self.closure
            .expr(label)
            .iter()
            .filter_map(|v| match v {
                AbstractValue::Ctor(l) => Some(*l),
                _ => None,
            })
            .collect()
    }
}

fn children_of(program: &Program, label: Label) -> Vec<Label> {
    match &program.node(label).shape {
        NodeShape::Var(_) | NodeShape::Const | NodeShape::Prim(_) | NodeShape::ModuleAccess { .. } => Vec::new(),
        NodeShape::Let { value, body, .. } => vec![*value, *body],
        NodeShape::Fun(desc) => desc.bodies.iter().map(|(_, l)| *l).collect(),
        NodeShape::App { func, args } => std::iter::once(*func).chain(args.iter().copied()).collect(),
        NodeShape::Match { scrutinee, arms } => std::iter::once(*scrutinee)
            .chain(arms.iter().flat_map(|a| a.guard.into_iter().chain(std::iter::once(a.body))))
            .collect(),
        NodeShape::Try { body, arms } => std::iter::once(*body)
            .chain(arms.iter().flat_map(|a| a.guard.into_iter().chain(std::iter::once(a.body))))
            .collect(),
        NodeShape::Tuple(items) | NodeShape::ArrayLit(items) => items.clone(),
        NodeShape::Record(fields) => fields.iter().map(|f| f.value).collect(),
        NodeShape::Construct { args, .. } => args.clone(),
        NodeShape::Variant { arg, .. } => arg.into_iter().copied().collect(),
        NodeShape::Field { target, .. } => vec![*target],
        NodeShape::SetField { target, value, .. } => vec![*target, *value],
        NodeShape::Sequence(a, b) => vec![*a, *b],
        NodeShape::If { cond, then_branch, else_branch } => std::iter::once(*cond)
            .chain(std::iter::once(*then_branch))
            .chain(else_branch.into_iter().copied())
            .collect(),
        NodeShape::While { cond, body } => vec![*cond, *body],
        NodeShape::For { lo, hi, body, .. } => vec![*lo, *hi, *body],
        NodeShape::Raise(inner) | NodeShape::Lazy(inner) => vec![*inner],
        NodeShape::Module { .. } => Vec::new(),
    }
}

impl Builder<'_> {
    fn build_app(&mut self, label: Label, func: Label, args: &[Label]) {
        if args.is_empty() {
            self.edge(FlowNode::Expr(label), FlowNode::Expr(func), Transformer::WrapFunc);
            return;
        }
        self.edge(FlowNode::Expr(label), FlowNode::Expr(func), Transformer::WrapFuncN(args.len()));
        self.wire_call_chain(label, func, args);
    }

    /// For every concrete `Fn`/`PartialApp` value flowing into `func_label`,
    /// wires the call site's own liveness through to the matching body
    /// (edge `Expr(L) -> Expr(body)` identity, edge `Id(param) ->
    /// Expr(a)` identity), recursing one level per curried argument still
    /// pending — mirroring `closure::resolve_reductions`'s reduction
    /// chaining, but over the statically known argument labels rather
    /// than a worklist, since by depgraph-build time the closure map is
    /// already solved.
    fn wire_call_chain(&mut self, call: Label, func_label: Label, args: &[Label]) {
        let Some((&first, rest)) = args.split_first() else { return };
        let values: Vec<AbstractValue> = self.closure.expr(func_label).iter().cloned().collect();

        for value in values {
            match value {
                AbstractValue::Fn(fl) => {
                    let Some(desc) = (match &self.program.node(fl).shape {
                        NodeShape::Fun(desc) => Some(desc.clone()),
                        _ => None,
                    }) else {
                        continue;
                    };
                    self.edge(FlowNode::Id(desc.param), FlowNode::Expr(first), Transformer::Identity);
                    for (_, body) in &desc.bodies {
                        if rest.is_empty() {
                            self.edge(FlowNode::Expr(call), FlowNode::Expr(*body), Transformer::Identity);
                        } else {
                            self.edge(FlowNode::Expr(call), FlowNode::Expr(*body), Transformer::WrapFuncN(rest.len()));
                            self.wire_call_chain(call, *body, rest);
                        }
                    }
                }
                AbstractValue::PartialApp(inner_func, existing) => {
                    let mut combined = existing.clone();
                    combined.push(first);
                    combined.extend(rest.iter().copied());
                    self.wire_call_chain(call, inner_func, &combined);
                }
                _ => {}
            }
        }
    }

    fn build_match(&mut self, label: Label, scrutinee: Label, arms: &[crate::preprocess::ArmDescriptor]) {
        let mut pattern_demand = Live::Bot;
        for arm in arms {
            self.edge(FlowNode::Expr(label), FlowNode::Expr(arm.body), Transformer::Identity);
            if let Some(guard) = arm.guard {
                self.edge(FlowNode::Expr(label), FlowNode::Expr(guard), Transformer::IfNotBot(Box::new(Live::Top)));
            }
            pattern_demand = pattern_demand.join(&liveness::controlled_by_pat(&arm.pat));
            self.pattern_edges(arm.pat.clone(), scrutinee);
        }
        self.edge(
            FlowNode::Expr(label),
            FlowNode::Expr(scrutinee),
            Transformer::IfNotBot(Box::new(pattern_demand)),
        );
    }

    fn build_field_read(&mut self, label: Label, target: Label, field: Symbol) {
        // If the target is a statically-known record/construct at *every*
        // concrete value, project the read precisely (`from_field`); an
        // unresolved or `⊤` target already gets the conservative `Top`-edge
        // at field-access's own label from the closure solver's fallback,
        // so nothing further is owed here for soundness.
        for value in self.closure.expr(target).iter() {
            if let AbstractValue::Ctor(record_label) = value {
                if constrain::record_field_mutable(self.program, *record_label, field) {
                    self.edge(FlowNode::Expr(label), FlowNode::Mem(*record_label, field), Transformer::Identity);
                } else if let Some((tag, _children)) = constrain::ctor_tag_of(self.program, *record_label) {
                    if let Some(index) = field_index(self.program, *record_label, field) {
                        self.edge(
                            FlowNode::Expr(label),
                            FlowNode::Expr(target),
                            Transformer::FromField(tag.clone(), index),
                        );
                    }
                }
            }
        }
    }

    fn build_set_field(&mut self, _label: Label, target: Label, field: Symbol, value: Label) {
        for v in self.closure.expr(target).iter() {
            if let AbstractValue::Mutable(l, f) = v {
                if *f == field {
                    self.edge(FlowNode::Mem(*l, *f), FlowNode::Expr(value), Transformer::Identity);
                }
            }
        }
        // The record carrier itself must be alive as a shape for the
        // assignment to make sense — pinned conservatively to `Top` rather
        // than the spec's narrower "empty ctor shape" demand (documented
        // simplification, see DESIGN.md).
        self.pin_top(FlowNode::Expr(target));
    }
}

fn field_index(program: &Program, label: Label, field: Symbol) -> Option<usize> {
    match &program.node(label).shape {
        NodeShape::Record(fields) => fields.iter().position(|f| f.name == field),
        _ => None,
    }
}

/// Builds the dependency graph for a fully closed program.
pub fn build(program: &Program, closure: &ClosureMap) -> DepGraph {
    let builder = Builder { program, closure, graph: DiGraph::new(), index: HashMap::new(), effect_memo: HashMap::new() };
    builder.build()
}
