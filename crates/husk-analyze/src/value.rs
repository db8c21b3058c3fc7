//! Abstract values and value sets: the over-approximated set of values an
//! expression or identifier may evaluate to, as tracked by the closure
//! solver.

use husk_core::{Id, Label, ModuleName, Symbol};
use indexmap::IndexSet;

/// The name under which a `Ctor` value's children are keyed: ordinary
/// constructors, polymorphic variants, tuples, records, and "member of
/// module named s" all share this tag space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum CtorTag {
    /// The single canonical tag every tuple shares, regardless of arity.
    Tuple,
    /// Records share one tag; fields are distinguished by position, which
    /// the caller derives from the field name via the record's own shape.
    Record,
    Construct(Symbol),
    Variant(Symbol),
    /// "Member of module named s" — used for module-structure dependency
    /// edges.
    Module(ModuleName),
}

/// A single abstract value an expression or identifier may evaluate to.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum AbstractValue {
    /// A named primitive; arity and effect classification come from
    /// [`crate::constrain::primitives`].
    Prim(Symbol),
    /// A function closure, identified by its defining `Fun` expression
    /// label. The formal parameter and body descriptors live in the AST
    /// index under this same label — labels substitute for reference
    /// equality on closures, and are stable across runs.
    Fn(Label),
    /// An under-applied call: the function value's label plus the labels
    /// of the arguments already supplied, in order.
    PartialApp(Label, Vec<Label>),
    /// A constructed sum value — tuple, record, ordinary constructor, or
    /// polymorphic variant — identified by its defining expression's
    /// label. Like `Fn`, the shape (tag, children labels) is looked up from
    /// the AST index rather than duplicated here; see
    /// [`crate::constrain::ctor_tag_of`].
    Ctor(Label),
    /// A reference to a mutable record field's storage cell, allocated at
    /// the label of the enclosing record/construct expression.
    Mutable(Label, Symbol),
    /// Indirection to another expression's value set, resolved away by
    /// the closure solver's transitive-closure step.
    ExprRef(Label),
    /// Indirection to an identifier's value set.
    IdRef(Id),
    /// Escaped to the external world; equivalent to the universal set at
    /// lookup time.
    Unknown,
}

/// Either the universal set or a finite, deduplicated set of values.
#[derive(Clone, Debug, Default)]
pub enum ValueSet {
    #[default]
    Empty,
    Values(IndexSet<AbstractValue>),
    Top,
}

impl ValueSet {
    pub fn singleton(v: AbstractValue) -> Self {
        let mut set = IndexSet::new();
        set.insert(v);
        ValueSet::Values(set)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, ValueSet::Top)
    }

    pub fn len(&self) -> usize {
        match self {
            ValueSet::Empty => 0,
            ValueSet::Values(set) => set.len(),
            ValueSet::Top => usize::MAX,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ValueSet::Empty) || matches!(self, ValueSet::Values(s) if s.is_empty())
    }

    /// Iterate the concrete values. Yields nothing for `Top` — callers that
    /// need to treat `Top` specially check [`ValueSet::is_top`] first.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &AbstractValue> + '_> {
        match self {
            ValueSet::Empty | ValueSet::Top => Box::new(std::iter::empty()),
            ValueSet::Values(set) => Box::new(set.iter()),
        }
    }

    /// Join in a single value, reporting whether the set actually grew
    /// (used by the closure solver's worklist to decide whether a node's
    /// dependents need revisiting).
    pub fn insert(&mut self, v: AbstractValue) -> bool {
        match self {
            ValueSet::Top => false,
            ValueSet::Empty => {
                let mut set = IndexSet::new();
                set.insert(v);
                *self = ValueSet::Values(set);
                true
            }
            ValueSet::Values(set) => set.insert(v),
        }
    }

    /// Join another value set into this one. `⊤` absorbs every operation.
    pub fn join(&mut self, other: &ValueSet) -> bool {
        match other {
            ValueSet::Top => {
                let grew = !self.is_top();
                *self = ValueSet::Top;
                grew
            }
            ValueSet::Empty => false,
            ValueSet::Values(values) => {
                let mut grew = false;
                for v in values {
                    grew |= self.insert(v.clone());
                }
                grew
            }
        }
    }

    pub fn make_top(&mut self) -> bool {
        let grew = !self.is_top();
        *self = ValueSet::Top;
        grew
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use husk_core::Symbol;

    #[test]
    fn top_absorbs_join() {
        let mut vs = ValueSet::singleton(AbstractValue::Prim(Symbol::from_raw(0)));
        let mut top = ValueSet::Top;
        assert!(vs.join(&top));
        assert!(vs.is_top());
        assert!(!top.join(&ValueSet::singleton(AbstractValue::Unknown)));
    }

    #[test]
    fn insert_reports_growth() {
        let mut vs = ValueSet::Empty;
        assert!(vs.insert(AbstractValue::Unknown));
        assert!(!vs.insert(AbstractValue::Unknown));
        assert_eq!(vs.len(), 1);
    }
}
