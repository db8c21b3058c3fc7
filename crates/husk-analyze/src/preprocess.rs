//! Preprocessor & AST index.
//!
//! Walks each compilation unit, replacing every expression's placeholder
//! label with a fresh, globally unique one, and records a structural
//! summary of the node — independent of the owned AST — so later phases
//! can look a label up without re-walking or re-borrowing the tree.

use std::collections::HashMap;

use husk_core::{CompilationUnit, ExprKind, Id, Interner, Label, ModuleName, Pattern, SourceLoc, Symbol, TExpr};

use crate::error::Error;

/// A label's original source location plus a flattened description of its
/// node kind and children.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub loc: SourceLoc,
    pub unit_result: bool,
    pub shape: NodeShape,
}

#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub param: Id,
    /// One `(pattern, body label)` pair per case, in source order.
    pub bodies: Vec<(Pattern, Label)>,
}

#[derive(Debug, Clone)]
pub struct ArmDescriptor {
    pub pat: Pattern,
    pub guard: Option<Label>,
    pub body: Label,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: Symbol,
    pub value: Label,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub enum NodeShape {
    Var(Option<Id>),
    Const,
    Let { pat: Pattern, value: Label, body: Label },
    Fun(FunctionDescriptor),
    App { func: Label, args: Vec<Label> },
    Match { scrutinee: Label, arms: Vec<ArmDescriptor> },
    Try { body: Label, arms: Vec<ArmDescriptor> },
    Tuple(Vec<Label>),
    Record(Vec<FieldDescriptor>),
    Construct { ctor: Symbol, args: Vec<Label> },
    Variant { tag: Symbol, arg: Option<Label> },
    Field { target: Label, field: Symbol },
    SetField { target: Label, field: Symbol, value: Label },
    Sequence(Label, Label),
    If { cond: Label, then_branch: Label, else_branch: Option<Label> },
    While { cond: Label, body: Label },
    For { index: Id, lo: Label, hi: Label, up: bool, body: Label },
    Prim(Symbol),
    Raise(Label),
    ArrayLit(Vec<Label>),
    Lazy(Label),
    ModuleAccess { module: ModuleName, member: Symbol },
    /// A module's own value, keyed by the module's synthetic label.
    /// `members` maps each exported name to the Id bound at top level.
    Module {
        name: ModuleName,
        members: Vec<(Symbol, Id)>,
        signature: Option<Vec<Symbol>>,
    },
}

/// Where an identifier was bound, for declaration-site warnings.
#[derive(Debug, Clone)]
pub struct IdentInfo {
    pub decl_loc: SourceLoc,
}

/// The whole program after preprocessing: every unit's AST with labels
/// assigned in place, plus the flattened index built alongside the walk.
#[derive(Debug, Default)]
pub struct Program {
    pub units: Vec<CompilationUnit>,
    /// Shared with whatever loaded the input artifacts, so primitive names
    /// and diagnostic messages can resolve the same symbols.
    pub interner: Interner,
    next_label: u32,
    nodes: HashMap<Label, NodeSummary>,
    idents: HashMap<Id, IdentInfo>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interner(interner: Interner) -> Self {
        Self { interner, ..Self::default() }
    }

    fn fresh_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Preprocess and absorb one compilation unit. Recoverable: the caller
    /// may skip this unit and continue with the rest of the program on
    /// error.
    pub fn add_unit(&mut self, mut unit: CompilationUnit) -> Result<(), Error> {
        if unit.label != husk_core::Label::default() {
            return Err(Error::DuplicateLabel(unit.label));
        }
        unit.label = self.fresh_label();

        let mut members = Vec::new();
        for binding in &mut unit.bindings {
            self.walk_expr(&mut binding.value)?;
            self.bind_pattern_decls(&binding.pat, &binding.value.loc);
            if let (Some(name), Some(id)) = (binding.name, primary_id(&binding.pat)) {
                members.push((name, id));
            }
        }

        self.nodes.insert(
            unit.label,
            NodeSummary {
                loc: module_loc(&unit),
                unit_result: false,
                shape: NodeShape::Module {
                    name: unit.name,
                    members,
                    signature: unit.signature.clone(),
                },
            },
        );

        self.units.push(unit);
        Ok(())
    }

    pub fn node(&self, label: Label) -> &NodeSummary {
        husk_core::invariants::expect_label("AST index", label, self.nodes.get(&label))
    }

    pub fn try_node(&self, label: Label) -> Option<&NodeSummary> {
        self.nodes.get(&label)
    }

    pub fn ident(&self, id: Id) -> Option<&IdentInfo> {
        self.idents.get(&id)
    }

    pub fn all_labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.nodes.keys().copied()
    }

    /// Every identifier with a recorded declaration site, for the
    /// reporter's dead-identifier-at-declaration-site sweep.
    pub fn all_idents(&self) -> impl Iterator<Item = Id> + '_ {
        self.idents.keys().copied()
    }

    fn record_ident(&mut self, id: Id, loc: SourceLoc) {
        self.idents.entry(id).or_insert(IdentInfo { decl_loc: loc });
    }

    /// Registers every variable bound by a pattern as declared at `loc`.
    fn bind_pattern_decls(&mut self, pat: &Pattern, loc: &SourceLoc) {
        match pat {
            Pattern::Wildcard | Pattern::Const => {}
            Pattern::Var(id) => self.record_ident(*id, loc.clone()),
            Pattern::Alias(inner, id) => {
                self.bind_pattern_decls(inner, loc);
                self.record_ident(*id, loc.clone());
            }
            Pattern::Tuple(pats) | Pattern::Array(pats) => {
                for p in pats {
                    self.bind_pattern_decls(p, loc);
                }
            }
            Pattern::Construct { args, .. } => {
                for p in args {
                    self.bind_pattern_decls(p, loc);
                }
            }
            Pattern::Variant { arg, .. } => {
                if let Some(p) = arg {
                    self.bind_pattern_decls(p, loc);
                }
            }
            Pattern::Record(fields) => {
                for (_, p) in fields {
                    self.bind_pattern_decls(p, loc);
                }
            }
            Pattern::Or(a, b) => {
                self.bind_pattern_decls(a, loc);
                self.bind_pattern_decls(b, loc);
            }
            Pattern::Lazy(inner) => self.bind_pattern_decls(inner, loc),
        }
    }

    /// Assigns a fresh label to `expr` and every descendant, returning the
    /// label assigned to `expr` itself.
    fn walk_expr(&mut self, expr: &mut TExpr) -> Result<Label, Error> {
        if expr.label != Label::default() {
            return Err(Error::DuplicateLabel(expr.label));
        }
        let label = self.fresh_label();
        expr.label = label;
        let loc = expr.loc.clone();
        let unit_result = expr.unit_result;

        let shape = match &mut expr.kind {
            ExprKind::Var(id) => NodeShape::Var(*id),
            ExprKind::Const => NodeShape::Const,
            ExprKind::Let { pat, value, body } => {
                let value_label = self.walk_expr(value)?;
                self.bind_pattern_decls(pat, &value.loc);
                let body_label = self.walk_expr(body)?;
                NodeShape::Let { pat: pat.clone(), value: value_label, body: body_label }
            }
            ExprKind::Fun { param, cases } => {
                self.record_ident(*param, loc.clone());
                let mut bodies = Vec::with_capacity(cases.len());
                for case in cases.iter_mut() {
                    self.bind_pattern_decls(&case.pat, &case.body.loc);
                    let body_label = self.walk_expr(&mut case.body)?;
                    bodies.push((case.pat.clone(), body_label));
                }
                NodeShape::Fun(FunctionDescriptor { param: *param, bodies })
            }
            ExprKind::App { func, args } => {
                let func_label = self.walk_expr(func)?;
                let mut arg_labels = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    arg_labels.push(self.walk_expr(arg)?);
                }
                NodeShape::App { func: func_label, args: arg_labels }
            }
            ExprKind::Match { scrutinee, arms } => {
                let scrutinee_label = self.walk_expr(scrutinee)?;
                let arm_descs = self.walk_arms(arms)?;
                NodeShape::Match { scrutinee: scrutinee_label, arms: arm_descs }
            }
            ExprKind::Try { body, arms } => {
                let body_label = self.walk_expr(body)?;
                let arm_descs = self.walk_arms(arms)?;
                NodeShape::Try { body: body_label, arms: arm_descs }
            }
            ExprKind::Tuple(items) => {
                let mut labels = Vec::with_capacity(items.len());
                for item in items.iter_mut() {
                    labels.push(self.walk_expr(item)?);
                }
                NodeShape::Tuple(labels)
            }
            ExprKind::Record(fields) => {
                let mut descs = Vec::with_capacity(fields.len());
                for field in fields.iter_mut() {
                    let value_label = self.walk_expr(&mut field.value)?;
                    descs.push(FieldDescriptor {
                        name: field.name,
                        value: value_label,
                        mutable: field.mutable,
                    });
                }
                NodeShape::Record(descs)
            }
            ExprKind::Construct { ctor, args } => {
                let mut labels = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    labels.push(self.walk_expr(arg)?);
                }
                NodeShape::Construct { ctor: *ctor, args: labels }
            }
            ExprKind::Variant { tag, arg } => {
                let arg_label = match arg {
                    Some(a) => Some(self.walk_expr(a)?),
                    None => None,
                };
                NodeShape::Variant { tag: *tag, arg: arg_label }
            }
            ExprKind::Field { target, field } => {
                let target_label = self.walk_expr(target)?;
                NodeShape::Field { target: target_label, field: *field }
            }
            ExprKind::SetField { target, field, value } => {
                let target_label = self.walk_expr(target)?;
                let value_label = self.walk_expr(value)?;
                NodeShape::SetField { target: target_label, field: *field, value: value_label }
            }
            ExprKind::Sequence(a, b) => {
                let a_label = self.walk_expr(a)?;
                let b_label = self.walk_expr(b)?;
                NodeShape::Sequence(a_label, b_label)
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                let cond_label = self.walk_expr(cond)?;
                let then_label = self.walk_expr(then_branch)?;
                let else_label = match else_branch {
                    Some(e) => Some(self.walk_expr(e)?),
                    None => None,
                };
                NodeShape::If { cond: cond_label, then_branch: then_label, else_branch: else_label }
            }
            ExprKind::While { cond, body } => {
                let cond_label = self.walk_expr(cond)?;
                let body_label = self.walk_expr(body)?;
                NodeShape::While { cond: cond_label, body: body_label }
            }
            ExprKind::For { index, lo, hi, up, body } => {
                self.record_ident(*index, loc.clone());
                let lo_label = self.walk_expr(lo)?;
                let hi_label = self.walk_expr(hi)?;
                let body_label = self.walk_expr(body)?;
                NodeShape::For { index: *index, lo: lo_label, hi: hi_label, up: *up, body: body_label }
            }
            ExprKind::Prim(name) => NodeShape::Prim(*name),
            ExprKind::Raise(inner) => NodeShape::Raise(self.walk_expr(inner)?),
            ExprKind::ArrayLit(items) => {
                let mut labels = Vec::with_capacity(items.len());
                for item in items.iter_mut() {
                    labels.push(self.walk_expr(item)?);
                }
                NodeShape::ArrayLit(labels)
            }
            ExprKind::Lazy(inner) => NodeShape::Lazy(self.walk_expr(inner)?),
            ExprKind::ModuleAccess { module, member } => {
                NodeShape::ModuleAccess { module: *module, member: *member }
            }
        };

        self.nodes.insert(label, NodeSummary { loc, unit_result, shape });
        Ok(label)
    }

    fn walk_arms(
        &mut self,
        arms: &mut [husk_core::MatchArm],
    ) -> Result<Vec<ArmDescriptor>, Error> {
        let mut descs = Vec::with_capacity(arms.len());
        for arm in arms.iter_mut() {
            self.bind_pattern_decls(&arm.pat, &arm.body.loc);
            let guard_label = match &mut arm.guard {
                Some(g) => Some(self.walk_expr(g)?),
                None => None,
            };
            let body_label = self.walk_expr(&mut arm.body)?;
            descs.push(ArmDescriptor { pat: arm.pat.clone(), guard: guard_label, body: body_label });
        }
        Ok(descs)
    }
}

fn primary_id(pat: &Pattern) -> Option<Id> {
    match pat {
        Pattern::Var(id) => Some(*id),
        Pattern::Alias(_, id) => Some(*id),
        _ => None,
    }
}

fn module_loc(unit: &CompilationUnit) -> SourceLoc {
    unit.bindings
        .first()
        .map(|b| b.value.loc.clone())
        .unwrap_or_else(|| SourceLoc { file: String::new(), span: husk_core::Span::new(0, 0) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use husk_core::{ModuleName, Span, Symbol as Sym};

    fn loc() -> SourceLoc {
        SourceLoc { file: "t.ml".to_string(), span: Span::new(0, 1) }
    }

    fn module_name(stamp: u32) -> ModuleName {
        ModuleName(Sym::from_raw(stamp))
    }

    #[test]
    fn assigns_distinct_labels() {
        let mut program = Program::new();
        let unit = CompilationUnit {
            name: module_name(0),
            bindings: vec![husk_core::TopBinding {
                recursive: false,
                name: None,
                pat: Pattern::Wildcard,
                value: TExpr::new(loc(), ExprKind::Const),
            }],
            signature: None,
            label: husk_core::Label::default(),
        };
        program.add_unit(unit).unwrap();
        assert_eq!(program.units[0].bindings[0].value.label, Label(1));
        assert_eq!(program.units[0].label, Label(0));
    }

    #[test]
    fn rejects_already_labeled_unit() {
        let mut program = Program::new();
        let mut unit = CompilationUnit {
            name: module_name(0),
            bindings: vec![],
            signature: None,
            label: husk_core::Label::default(),
        };
        program.add_unit(unit.clone()).unwrap();
        unit.label = Label(0);
        let err = program.add_unit(unit).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel(_)));
    }
}
