//! Diagnostics (§6.6, §7): pure data, never thrown control flow. Carries
//! the stable diagnostic codes (`M204`, `M317`, `M331`, `M332`, `M364`,
//! `M511`, `M512`, `M513`, `M521`, …) a caller can match on without
//! depending on message text.

use rte_util::Severity;

use crate::item::ItemHandle;

/// One diagnostic: a stable code, severity, message, and the item it
/// originated from (if any) plus an optional source line.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub item: Option<ItemHandle>,
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(code: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            item: None,
            line: None,
        }
    }

    pub fn with_item(mut self, item: ItemHandle) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// `RteItem::CreateErrorString`/`RteDependencyResult::GetOutputMessage`
    /// shape (§4.1, §9 supplement 1): `"<packId>: <tag> '<id>': <severity>
    /// #<errNum>: <message>"`.
    pub fn render(&self, pack_id: &str, tag: &str, id: &str) -> String {
        rte_util::format_item_error(pack_id, tag, id, self.severity, self.code, &self.message)
    }
}

/// Diagnostics stream to a callback (§7: "User-visible failure surface").
/// The default sink is silent; no global/singleton state (§9 "global
/// mutable state" design note).
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// A sink that accumulates diagnostics for later inspection — the shape
/// most library callers want (collect then decide on exit code, per §7's
/// "error"/"warning" exit-code rule).
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink for DiagnosticLog {
    fn emit(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(code = diagnostic.code, severity = %diagnostic.severity, "diagnostic");
        self.diagnostics.push(diagnostic);
    }
}

impl DiagnosticLog {
    /// CLI exit-code rule (§7): 2 if any error, 1 if any warning, else 0.
    pub fn exit_code(&self) -> i32 {
        if self.diagnostics.iter().any(|d| d.severity == Severity::Error) {
            2
        } else if self.diagnostics.iter().any(|d| d.severity == Severity::Warning) {
            1
        } else {
            0
        }
    }
}

/// A silent sink (the default when no caller-supplied sink is given).
#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _diagnostic: Diagnostic) {}
}
