//! Diagnostic rendering: a source excerpt with an ASCII underline under
//! the dead range, built as a severity-tagged message collection plus a
//! builder-pattern printer over `annotate-snippets`.

use std::fmt::Write as _;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

use crate::closure::ClosureMap;
use crate::depgraph::FlowNode;
use crate::preprocess::Program;
use crate::report::Warning;
use crate::solve::LivenessMap;

/// Severity of a rendered diagnostic. Every warning the reporter emits is
/// `Severity::Warning` today; `Error` exists because the printer is shared
/// infrastructure, not a reflection of any analyzer output currently using
/// it (husk's own fatal conditions are `husk_analyze::Error`, reported
/// outside this collection entirely).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    severity: Severity,
    start: usize,
    end: usize,
    message: String,
}

/// A rendering-ready collection of diagnostics scoped to a single source
/// file: file, line, offsets, message, and excerpt are always reported
/// against one file at a time.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Entry>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Collects every warning whose source file matches `file` into a
    /// renderable set, for one-file-at-a-time CLI rendering against that
    /// file's text.
    pub fn from_warnings_for_file<'w>(warnings: impl IntoIterator<Item = &'w Warning>, file: &str) -> Self {
        let entries = warnings
            .into_iter()
            .filter(|w| w.source_file() == file)
            .map(|w| Entry {
                severity: w.severity,
                start: w.span.start as usize,
                end: w.span.end as usize,
                message: w.message.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn printer(&self) -> DiagnosticsPrinter<'_, '_> {
        DiagnosticsPrinter::new(self)
    }
}

/// Builder for rendering a [`Diagnostics`] set via a
/// `.source().path().colored().render()` chain.
pub struct DiagnosticsPrinter<'d, 's> {
    diagnostics: &'d Diagnostics,
    source: Option<&'s str>,
    path: Option<&'s str>,
    colored: bool,
}

impl<'d, 's> DiagnosticsPrinter<'d, 's> {
    pub fn new(diagnostics: &'d Diagnostics) -> Self {
        Self { diagnostics, source: None, path: None, colored: false }
    }

    pub fn source(mut self, source: &'s str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn path(mut self, path: &'s str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.format(&mut out).expect("String write never fails");
        out
    }

    pub fn format(&self, w: &mut impl std::fmt::Write) -> std::fmt::Result {
        let Some(source) = self.source else {
            return self.format_plain(w);
        };
        if self.diagnostics.is_empty() {
            return Ok(());
        }

        let renderer = if self.colored { Renderer::styled() } else { Renderer::plain() };

        for (i, entry) in self.diagnostics.entries.iter().enumerate() {
            let range = adjust_range(entry.start, entry.end, source.len());
            let mut snippet = Snippet::source(source)
                .line_start(1)
                .annotation(AnnotationKind::Primary.span(range).label(&entry.message));
            if let Some(p) = self.path {
                snippet = snippet.path(p);
            }

            let level = severity_to_level(entry.severity);
            let report: Vec<Group> = vec![level.primary_title(&entry.message).element(snippet)];

            if i > 0 {
                w.write_char('\n')?;
            }
            write!(w, "{}", renderer.render(&report))?;
        }

        Ok(())
    }

    fn format_plain(&self, w: &mut impl std::fmt::Write) -> std::fmt::Result {
        for (i, entry) in self.diagnostics.entries.iter().enumerate() {
            if i > 0 {
                w.write_char('\n')?;
            }
            write!(w, "{} at {}..{}: {}", entry.severity, entry.start, entry.end, entry.message)?;
        }
        Ok(())
    }
}

fn severity_to_level(severity: Severity) -> Level<'static> {
    match severity {
        Severity::Warning => Level::WARNING,
        Severity::Error => Level::ERROR,
    }
}

fn adjust_range(start: usize, end: usize, limit: usize) -> std::ops::Range<usize> {
    if start == end {
        return start..(start + 1).min(limit);
    }
    start..end
}

/// `--debug` dump of the intermediate tables: the closure map, reductions,
/// and liveness map, for inspection. Emitted via `tracing` rather than
/// stdout, consistent with the rest of the analyzer's ambient logging.
pub fn dump_debug_tables(program: &Program, closure: &ClosureMap, liveness: &LivenessMap) {
    for label in program.all_labels() {
        let vs = closure.expr(label);
        tracing::debug!(
            target: "husk::debug::closure",
            label = %label,
            effect = closure.has_side_effect(label),
            values = vs.len(),
            top = vs.is_top(),
            "closure entry"
        );
        let live = liveness.get(FlowNode::Expr(label));
        tracing::debug!(target: "husk::debug::liveness", label = %label, live = ?live, "liveness entry");
    }
    for id in program.all_idents() {
        let live = liveness.get(FlowNode::Id(id));
        tracing::debug!(target: "husk::debug::liveness", id = ?id, live = ?live, "identifier liveness");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::WarningKind;
    use husk_core::Span;

    fn warning(file: &str, start: u32, end: u32) -> Warning {
        Warning {
            severity: Severity::Warning,
            rule: "Dead Value",
            file: file.to_string(),
            span: Span::new(start, end),
            kind: WarningKind::DeadExpression,
            message: "this value is never used".to_string(),
        }
    }

    #[test]
    fn plain_format_has_no_source_dependency() {
        let warnings = vec![warning("a.ml", 4, 5)];
        let diags = Diagnostics::from_warnings_for_file(&warnings, "a.ml");
        let rendered = diags.printer().render();
        assert!(rendered.contains("this value is never used"));
    }

    #[test]
    fn renders_with_source_excerpt() {
        let warnings = vec![warning("a.ml", 8, 9)];
        let diags = Diagnostics::from_warnings_for_file(&warnings, "a.ml");
        let source = "let x = 1 in 2";
        let rendered = diags.printer().source(source).path("a.ml").render();
        assert!(rendered.contains("a.ml"));
    }

    #[test]
    fn filters_by_source_file() {
        let warnings = vec![warning("a.ml", 0, 1), warning("b.ml", 0, 1)];
        let diags = Diagnostics::from_warnings_for_file(&warnings, "a.ml");
        assert_eq!(diags.len(), 1);
    }
}
