//! The `Live` lattice.
//!
//! A finite-height lattice describing *how much* of a value is observed:
//! `Top` means fully observed, `Bot` means not observed at all, `Func`
//! describes demand on a function's result, `Ctor` describes demand on a
//! sum value's fields, keyed by constructor/variant/tuple/record/module
//! tag.

use std::collections::BTreeMap;

use crate::value::CtorTag;

/// `Live := Top | Bot | Func(Live) | Ctor(Map<CtorTag, [Live]>)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Live {
    Top,
    Bot,
    Func(Box<Live>),
    Ctor(BTreeMap<CtorTag, Vec<Live>>),
}

impl Default for Live {
    fn default() -> Self {
        Live::Bot
    }
}

impl Live {
    pub fn func(inner: Live) -> Live {
        Live::Func(Box::new(inner))
    }

    /// `from_field(tag, i, l)`: injects `l` into the i-th slot under `tag`,
    /// other slots `Bot`, other tags absent.
    pub fn from_field(tag: CtorTag, index: usize, l: Live) -> Live {
        let mut slots = vec![Live::Bot; index + 1];
        slots[index] = l;
        let mut map = BTreeMap::new();
        map.insert(tag, slots);
        Live::Ctor(map)
    }

    /// `field(tag, i)`: extracts the i-th slot of the given tag. `Top` if
    /// the carrier is `Top`, `Bot` otherwise — including when
    /// the carrier is a `Ctor` map that simply doesn't mention this tag, or
    /// doesn't have a slot at this index (arity mismatch from an unresolved
    /// or under-approximated constructor).
    pub fn field(&self, tag: &CtorTag, index: usize) -> Live {
        match self {
            Live::Top => Live::Top,
            Live::Ctor(map) => map.get(tag).and_then(|slots| slots.get(index)).cloned().unwrap_or(Live::Bot),
            Live::Bot | Live::Func(_) => Live::Bot,
        }
    }

    /// `body(Func(l)) = l; body(Top) = Top; else Bot`.
    pub fn body(&self) -> Live {
        match self {
            Live::Func(inner) => (**inner).clone(),
            Live::Top => Live::Top,
            Live::Bot | Live::Ctor(_) => Live::Bot,
        }
    }

    /// `λl. if l is Bot then Bot else other` — used for guard/condition/
    /// scrutinee edges where "any demand at all" collapses to full demand
    /// on a control-flow-only subexpression.
    pub fn ifnotbot(&self, then: &Live) -> Live {
        if matches!(self, Live::Bot) { Live::Bot } else { then.clone() }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Live::Bot)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Live::Top)
    }

    /// Pointwise join: commutative, associative, idempotent; `Bot` is
    /// identity, `Top` is absorbing.
    ///
    /// For `Ctor` vs `Ctor` with a tag present in only one operand, the
    /// missing side's contribution is `Top` — join is the "either branch
    /// might run" combinator, and an unmatched tag means we cannot rule
    /// out that branch demanding everything under it, so the conservative
    /// (sound) choice is `Top`, not silence.
    pub fn join(&self, other: &Live) -> Live {
        match (self, other) {
            (Live::Top, _) | (_, Live::Top) => Live::Top,
            (Live::Bot, x) | (x, Live::Bot) => x.clone(),
            (Live::Func(a), Live::Func(b)) => Live::func(a.join(b)),
            (Live::Ctor(a), Live::Ctor(b)) => {
                let mut out: BTreeMap<CtorTag, Vec<Live>> = BTreeMap::new();
                for tag in a.keys().chain(b.keys()).collect::<std::collections::BTreeSet<_>>() {
                    match (a.get(tag), b.get(tag)) {
                        (Some(sa), Some(sb)) => {
                            let len = sa.len().max(sb.len());
                            let slots = (0..len)
                                .map(|i| {
                                    let la = sa.get(i).cloned().unwrap_or(Live::Bot);
                                    let lb = sb.get(i).cloned().unwrap_or(Live::Bot);
                                    la.join(&lb)
                                })
                                .collect();
                            out.insert(tag.clone(), slots);
                        }
                        (Some(_), None) | (None, Some(_)) => return Live::Top,
                        (None, None) => unreachable!("tag came from one of the two maps"),
                    }
                }
                Live::Ctor(out)
            }
            // Func vs Ctor: incomparable shapes (one describes "call result
            // demand", the other "field demand") — conservatively Top.
            (Live::Func(_), Live::Ctor(_)) | (Live::Ctor(_), Live::Func(_)) => Live::Top,
        }
    }

    /// Pointwise meet, dual to `join`: `Top` is identity, `Bot` absorbing.
    /// A tag present in only one operand contributes `Bot` on the missing
    /// side — meet models "both paths must agree," so demand not
    /// corroborated by both sides collapses to "not demanded."
    pub fn meet(&self, other: &Live) -> Live {
        match (self, other) {
            (Live::Bot, _) | (_, Live::Bot) => Live::Bot,
            (Live::Top, x) | (x, Live::Top) => x.clone(),
            (Live::Func(a), Live::Func(b)) => Live::func(a.meet(b)),
            (Live::Ctor(a), Live::Ctor(b)) => {
                let mut out: BTreeMap<CtorTag, Vec<Live>> = BTreeMap::new();
                for (tag, sa) in a {
                    if let Some(sb) = b.get(tag) {
                        let len = sa.len().max(sb.len());
                        let slots = (0..len)
                            .map(|i| {
                                let la = sa.get(i).cloned().unwrap_or(Live::Bot);
                                let lb = sb.get(i).cloned().unwrap_or(Live::Bot);
                                la.meet(&lb)
                            })
                            .collect();
                        out.insert(tag.clone(), slots);
                    }
                }
                Live::Ctor(out)
            }
            (Live::Func(_), Live::Ctor(_)) | (Live::Ctor(_), Live::Func(_)) => Live::Bot,
        }
    }
}

/// `controlledByPat(p)`: the structural liveness a pattern match demands of
/// its scrutinee — constants demand `Top` (their concrete
/// identity matters), variables demand `Bot` (a variable binding observes
/// nothing about the scrutinee's shape by itself), constructors/tuples/
/// records/variants demand the join of their children's demand, wrapped in
/// the matching tag.
pub fn controlled_by_pat(pat: &husk_core::Pattern) -> Live {
    use husk_core::Pattern;

    match pat {
        Pattern::Wildcard => Live::Bot,
        Pattern::Const => Live::Top,
        Pattern::Var(_) => Live::Bot,
        Pattern::Alias(inner, _) => controlled_by_pat(inner),
        Pattern::Or(a, b) => controlled_by_pat(a).join(&controlled_by_pat(b)),
        Pattern::Array(_) | Pattern::Lazy(_) => Live::Top,
        Pattern::Tuple(pats) => ctor_demand(CtorTag::Tuple, pats.iter().map(controlled_by_pat).collect()),
        Pattern::Record(fields) => {
            ctor_demand(CtorTag::Record, fields.iter().map(|(_, p)| controlled_by_pat(p)).collect())
        }
        Pattern::Construct { ctor, args } => {
            ctor_demand(CtorTag::Construct(*ctor), args.iter().map(controlled_by_pat).collect())
        }
        Pattern::Variant { tag, arg } => {
            ctor_demand(CtorTag::Variant(*tag), arg.iter().map(|p| controlled_by_pat(p)).collect())
        }
    }
}

fn ctor_demand(tag: CtorTag, slots: Vec<Live>) -> Live {
    let mut map = BTreeMap::new();
    map.insert(tag, slots);
    Live::Ctor(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use husk_core::Symbol;
    use pretty_assertions::assert_eq;

    fn sym(n: u32) -> Symbol {
        Symbol::from_raw(n)
    }

    #[test]
    fn join_is_commutative_and_idempotent() {
        let a = Live::func(Live::Top);
        let b = Live::Bot;
        assert_eq!(a.join(&b), b.join(&a));
        assert_eq!(a.join(&a), a);
    }

    #[test]
    fn bot_is_join_identity_top_is_absorbing() {
        let a = Live::func(Live::Bot);
        assert_eq!(a.join(&Live::Bot), a);
        assert_eq!(a.join(&Live::Top), Live::Top);
    }

    #[test]
    fn meet_duals_join() {
        let a = Live::func(Live::Top);
        assert_eq!(a.meet(&Live::Top), a);
        assert_eq!(a.meet(&Live::Bot), Live::Bot);
    }

    #[test]
    fn from_field_then_field_roundtrips() {
        let tag = CtorTag::Construct(sym(0));
        let injected = Live::from_field(tag.clone(), 1, Live::Top);
        assert_eq!(injected.field(&tag, 1), Live::Top);
        assert_eq!(injected.field(&tag, 0), Live::Bot);
    }

    #[test]
    fn field_on_top_is_top_on_bot_is_bot() {
        let tag = CtorTag::Tuple;
        assert_eq!(Live::Top.field(&tag, 0), Live::Top);
        assert_eq!(Live::Bot.field(&tag, 0), Live::Bot);
    }

    #[test]
    fn mismatched_ctor_tags_join_to_top_meet_to_bot() {
        let mut a = BTreeMap::new();
        a.insert(CtorTag::Construct(sym(0)), vec![Live::Bot]);
        let a = Live::Ctor(a);
        let mut b = BTreeMap::new();
        b.insert(CtorTag::Construct(sym(1)), vec![Live::Bot]);
        let b = Live::Ctor(b);
        assert_eq!(a.join(&b), Live::Top);
        assert_eq!(a.meet(&b), Live::Ctor(BTreeMap::new()));
    }

    #[test]
    fn controlled_by_pat_const_is_top_var_is_bot() {
        assert_eq!(controlled_by_pat(&husk_core::Pattern::Const), Live::Top);
        assert_eq!(
            controlled_by_pat(&husk_core::Pattern::Var(husk_core::Id::new(
                husk_core::ModuleName(sym(0)),
                0
            ))),
            Live::Bot
        );
    }

    #[test]
    fn controlled_by_pat_tuple_joins_children() {
        let pat = husk_core::Pattern::Tuple(vec![husk_core::Pattern::Const, husk_core::Pattern::Wildcard]);
        let live = controlled_by_pat(&pat);
        assert_eq!(live.field(&CtorTag::Tuple, 0), Live::Top);
        assert_eq!(live.field(&CtorTag::Tuple, 1), Live::Bot);
    }
}
