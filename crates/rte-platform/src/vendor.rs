use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of comparing an expression's `Dvendor`/`Bvendor` attribute against
/// a device or board's actual vendor string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorMatch {
    /// Same canonical vendor (exact match, or both map to the same synonym
    /// group).
    Match,
    Mismatch,
}

/// Vendor-name synonyms, e.g. `"ARM"` / `"ARM Ltd."` / `"Arm Limited"` all
/// naming the same pack vendor.
///
/// This is intentionally data, not logic (Open Question 1 in the source
/// specification): the core never hard-codes vendor aliases. Callers build
/// the table from whatever registry their environment provides; an empty
/// table falls back to case-insensitive exact comparison only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalVendorTable {
    /// Maps a lowercased vendor synonym to its canonical lowercased name.
    canonical: HashMap<String, String>,
}

impl CanonicalVendorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(canonical, synonyms)` pairs. Each synonym
    /// (and the canonical name itself) maps to the canonical name.
    pub fn from_groups<I, S, J>(groups: I) -> Self
    where
        I: IntoIterator<Item = (S, J)>,
        S: Into<String>,
        J: IntoIterator<Item = S>,
    {
        let mut canonical = HashMap::new();
        for (name, synonyms) in groups {
            let name = name.into();
            let key = name.to_lowercase();
            canonical.insert(key.clone(), key.clone());
            for syn in synonyms {
                canonical.insert(syn.into().to_lowercase(), key.clone());
            }
        }
        Self { canonical }
    }

    fn resolve<'a>(&'a self, vendor: &'a str) -> String {
        let key = vendor.to_lowercase();
        self.canonical.get(&key).cloned().unwrap_or(key)
    }

    /// Compares an expression's vendor attribute (which may carry a
    /// wildcard-free exact string; vendor fields are never wildcarded in
    /// CMSIS packs) against an actual vendor string.
    pub fn matches(&self, expr_vendor: &str, actual_vendor: &str) -> VendorMatch {
        if self.resolve(expr_vendor) == self.resolve(actual_vendor) {
            VendorMatch::Match
        } else {
            VendorMatch::Mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_is_case_insensitive_exact() {
        let t = CanonicalVendorTable::new();
        assert_eq!(t.matches("ARM", "arm"), VendorMatch::Match);
        assert_eq!(t.matches("ARM", "NXP"), VendorMatch::Mismatch);
    }

    #[test]
    fn synonyms_unify_across_spellings() {
        let t = CanonicalVendorTable::from_groups([("ARM", vec!["Arm Limited", "ARM Ltd."])]);
        assert_eq!(t.matches("Arm Limited", "ARM"), VendorMatch::Match);
        assert_eq!(t.matches("ARM Ltd.", "arm limited"), VendorMatch::Match);
    }
}
