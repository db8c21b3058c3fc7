//! The typed AST artifact: a concrete, `serde`-deserializable stand-in for
//! "one compilation unit's typed tree, as produced by the host compiler."
//! Real host compilers hand the analyzer a richer, compiler-internal
//! representation; this is the JSON-friendly shape `husk` actually
//! consumes, covering every node kind the constraint generator
//! pattern-matches on.
//!
//! `label` fields are placeholders until the preprocessor assigns fresh,
//! globally unique labels; they default to [`Label::UNASSIGNED`] so
//! host-compiler artifacts need not invent label values of their own.

use crate::{Id, ModuleName, SourceLoc, Symbol};

/// Handle assigned by the preprocessor; see [`crate::ident::Label`].
pub use crate::ident::Label;

impl Label {
    /// Placeholder used before the preprocessor assigns a real label.
    pub const UNASSIGNED: Label = Label(u32::MAX);
}

impl Default for Label {
    fn default() -> Self {
        Label::UNASSIGNED
    }
}

/// One compilation unit: a single top-level module's typed AST.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompilationUnit {
    pub name: ModuleName,
    /// Top-level value bindings, in source order. `rec` groups (mutually
    /// recursive bindings) are represented as consecutive bindings sharing
    /// `recursive: true`; the dependency collector and closure solver treat
    /// recursion uniformly via the flow graph, so no special grouping is
    /// needed beyond the flag.
    pub bindings: Vec<TopBinding>,
    /// Exported member names, if this unit has a signature restricting its
    /// interface. `None` means every top-level binding is exported.
    pub signature: Option<Vec<Symbol>>,
    /// Label assigned to "this module as a value" for the module-structure
    /// dependency rule. Filled in during preprocessing.
    #[serde(default)]
    pub label: Label,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TopBinding {
    pub recursive: bool,
    /// The bound name, when `pat` is a simple variable — module members are
    /// referred to from other units by name, so top-level bindings need a
    /// name even though ordinary patterns don't carry one.
    pub name: Option<Symbol>,
    pub pat: Pattern,
    pub value: TExpr,
}

/// A single labeled expression node.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TExpr {
    #[serde(default)]
    pub label: Label,
    pub loc: SourceLoc,
    /// Host-provided hint that this expression's static type is unit.
    /// Consumed, never inferred (spec Non-goals: "No type inference") —
    /// the host compiler already typechecked everything we see.
    #[serde(default)]
    pub unit_result: bool,
    pub kind: ExprKind,
}

impl TExpr {
    pub fn new(loc: SourceLoc, kind: ExprKind) -> Self {
        Self {
            label: Label::UNASSIGNED,
            loc,
            unit_result: false,
            kind,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum ExprKind {
    /// A variable reference. `None` when the identifier escapes to an
    /// external module with no tracked definition.
    Var(Option<Id>),
    /// Any constant literal (int, float, string, bool, unit, ()).
    Const,
    Let {
        pat: Pattern,
        value: Box<TExpr>,
        body: Box<TExpr>,
    },
    /// `fun p1 -> body1 | p2 -> body2 | ...`, desugared the way the host
    /// compiler desugars `function`: a single synthetic formal `param` is
    /// applied at the call site, then pattern-matched against each case in
    /// turn. A plain single-parameter `fun x -> e` is one case with a
    /// variable pattern equal to `param` itself.
    Fun {
        param: Id,
        cases: Vec<FunCase>,
    },
    /// `f a1 a2 ... an`, curried application of `n` arguments.
    App {
        func: Box<TExpr>,
        args: Vec<TExpr>,
    },
    Match {
        scrutinee: Box<TExpr>,
        arms: Vec<MatchArm>,
    },
    /// `try body with arms`. Modeled as the body plus an additional set of
    /// arms matched against any raised exception.
    Try {
        body: Box<TExpr>,
        arms: Vec<MatchArm>,
    },
    Tuple(Vec<TExpr>),
    Record(Vec<RecordField>),
    /// An ordinary sum-type constructor application, e.g. `Some x`.
    Construct {
        ctor: Symbol,
        args: Vec<TExpr>,
    },
    /// A polymorphic variant, e.g. `` `Foo x``.
    Variant {
        tag: Symbol,
        arg: Option<Box<TExpr>>,
    },
    Field {
        target: Box<TExpr>,
        field: Symbol,
    },
    /// `target.field <- value`.
    SetField {
        target: Box<TExpr>,
        field: Symbol,
        value: Box<TExpr>,
    },
    Sequence(Box<TExpr>, Box<TExpr>),
    If {
        cond: Box<TExpr>,
        then_branch: Box<TExpr>,
        else_branch: Option<Box<TExpr>>,
    },
    While {
        cond: Box<TExpr>,
        body: Box<TExpr>,
    },
    For {
        index: Id,
        lo: Box<TExpr>,
        hi: Box<TExpr>,
        up: bool,
        body: Box<TExpr>,
    },
    /// A primitive operation by name; arity and effect classification come
    /// from `husk_analyze::primitives`.
    Prim(Symbol),
    Raise(Box<TExpr>),
    ArrayLit(Vec<TExpr>),
    Lazy(Box<TExpr>),
    /// Reference to `module.member` where `module` is a different
    /// compilation unit.
    ModuleAccess {
        module: ModuleName,
        member: Symbol,
    },
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FunCase {
    pub pat: Pattern,
    pub body: TExpr,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MatchArm {
    pub pat: Pattern,
    pub guard: Option<TExpr>,
    pub body: TExpr,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RecordField {
    pub name: Symbol,
    pub value: TExpr,
    pub mutable: bool,
}

/// A pattern. Patterns are not labeled — they're structural descriptions
/// used for binding, not values in their own right.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    Wildcard,
    Var(Id),
    Alias(Box<Pattern>, Id),
    Const,
    Tuple(Vec<Pattern>),
    Construct { ctor: Symbol, args: Vec<Pattern> },
    Variant { tag: Symbol, arg: Option<Box<Pattern>> },
    Record(Vec<(Symbol, Pattern)>),
    Or(Box<Pattern>, Box<Pattern>),
    Array(Vec<Pattern>),
    Lazy(Box<Pattern>),
}
