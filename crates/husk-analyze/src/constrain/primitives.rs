//! The pure-primitive registry.
//!
//! The host compiler's own primitive table (arity, effects) isn't
//! available to a standalone analyzer, so `husk` ships a small hardcoded
//! list of primitives known to be pure and side-effect-free; everything
//! else is conservatively treated as tainting.

/// Names of primitives known to be pure: they neither cause an observable
/// side effect nor leak their operands to the external world beyond
/// ordinary value flow.
///
/// Deliberately tiny. Ordinary arithmetic forces its operands live (e.g.
/// `let f x = x + 1 in f 3` warns on nothing, because addition taints both
/// operands), so arithmetic and comparison are *not* listed here even
/// though a real host registry would likely mark them pure — this list
/// only holds primitives with no plausible observable effect at all:
/// boolean connectives and the identity passthrough.
const PURE_NAMES: &[&str] = &["%not", "%and", "%or", "%boolnot", "%identity"];

/// Whether a primitive name (already resolved to a string) is pure.
pub fn is_pure_name(name: &str) -> bool {
    PURE_NAMES.contains(&name)
}

/// Declared arity of a primitive, when known. Primitives of unknown arity
/// are treated conservatively: every supplied argument taints the result.
pub fn arity(name: &str) -> Option<usize> {
    match name {
        "%not" | "%boolnot" | "%identity" => Some(1),
        "%and" | "%or" => Some(2),
        "%addint" | "%subint" | "%mulint" | "%divint" | "%modint" | "%addfloat" | "%subfloat" | "%mulfloat"
        | "%divfloat" | "%eq" | "%ne" | "%lt" | "%le" | "%gt" | "%ge" | "%compare" => Some(2),
        "%negint" | "%negfloat" => Some(1),
        _ => None,
    }
}
