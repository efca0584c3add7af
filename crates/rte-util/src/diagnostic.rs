use std::fmt;

/// Severity of a diagnostic, shared between item-level `validate()` errors
/// and the solver/generator diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Advisory,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Advisory => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Builds an item-validation error string of the shape
/// `"<packId>: <tag> '<id>': <severity> #<errNum>: <message>"`.
pub fn format_item_error(
    pack_id: &str,
    tag: &str,
    id: &str,
    severity: Severity,
    err_num: &str,
    message: &str,
) -> String {
    format!("{pack_id}: {tag} '{id}': {severity} #{err_num}: {message}")
}
