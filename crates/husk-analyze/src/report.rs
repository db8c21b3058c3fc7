//! Reporter: turns a solved liveness map into ordered warnings.

use husk_core::Span;

use crate::closure::ClosureMap;
use crate::depgraph::FlowNode;
use crate::diagnostics::Severity;
use crate::preprocess::{NodeShape, Program};
use crate::solve::LivenessMap;

/// Which of the two dead-node shapes a warning reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    DeadExpression,
    DeadBinding,
}

/// One dead-value diagnostic.
#[derive(Debug, Clone)]
pub struct Warning {
    pub severity: Severity,
    pub rule: &'static str,
    pub file: String,
    pub span: Span,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn source_file(&self) -> &str {
        &self.file
    }

    /// Deterministic sort key: by source file, then by byte offset (spec
    /// §5 "Warning output order is deterministic ... by source file then
    /// by byte offset").
    pub fn order_key(&self) -> (&str, u32) {
        (&self.file, self.span.start)
    }
}

fn dead_expression_warning(file: String, span: Span) -> Warning {
    Warning {
        severity: Severity::Warning,
        rule: "Dead Value",
        file,
        span,
        kind: WarningKind::DeadExpression,
        message: "this expression's value is never used".to_string(),
    }
}

fn dead_binding_warning(file: String, span: Span) -> Warning {
    Warning {
        severity: Severity::Warning,
        rule: "Dead Value",
        file,
        span,
        kind: WarningKind::DeadBinding,
        message: "this binding is never used".to_string(),
    }
}

/// A flow node is **dead** iff its liveness is `Bot` and, for `Expr(L)`,
/// `L` has no side effect. Dead expression nodes whose static type is
/// unit are suppressed — their result is by definition uninformative;
/// dead identifier nodes are reported at their declaration site instead
/// of wherever they happened to be bound.
pub fn report(program: &Program, closure: &ClosureMap, liveness: &LivenessMap) -> Vec<Warning> {
    let mut warnings = Vec::new();

    for label in program.all_labels() {
        let node = program.node(label);
        if matches!(node.shape, NodeShape::Module { .. }) {
            continue;
        }
        if node.unit_result {
            continue;
        }
        if closure.has_side_effect(label) {
            continue;
        }
        if liveness.get(FlowNode::Expr(label)).is_bot() {
            warnings.push(dead_expression_warning(node.loc.file.clone(), node.loc.span));
        }
    }

    for id in program.all_idents() {
        if liveness.get(FlowNode::Id(id)).is_bot() {
            if let Some(info) = program.ident(id) {
                warnings.push(dead_binding_warning(info.decl_loc.file.clone(), info.decl_loc.span));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_key_sorts_by_file_then_offset() {
        let a = dead_expression_warning("a.ml".to_string(), Span::new(10, 11));
        let b = dead_expression_warning("a.ml".to_string(), Span::new(2, 3));
        let c = dead_expression_warning("b.ml".to_string(), Span::new(0, 1));
        let mut warnings = vec![a.clone(), b.clone(), c.clone()];
        warnings.sort_by(|x, y| x.order_key().cmp(&y.order_key()));
        assert_eq!(warnings[0].span, b.span);
        assert_eq!(warnings[1].span, a.span);
        assert_eq!(warnings[2].file, "b.ml");
    }

    #[test]
    fn warning_kind_distinguishes_expression_and_binding() {
        let w = dead_binding_warning("a.ml".to_string(), Span::new(0, 1));
        assert_eq!(w.kind, WarningKind::DeadBinding);
    }
}
