//! Ambient configuration threaded into model operations instead of read
//! from globals (§9 "global mutable state" design note, SPEC_FULL §1.3):
//! mirrors how `cargo::util::Config` is passed explicitly rather than
//! accessed through a singleton.

use rte_platform::CanonicalVendorTable;

use crate::model::PackageFilter;

/// A toolchain registry entry: one compiler installation the core can
/// check conditions/components against (§6.3).
#[derive(Debug, Clone)]
pub struct ToolchainEntry {
    pub name: String,
    pub version: semver::Version,
    pub install_root: String,
}

/// The external collaborators named in §6, modeled as data passed into
/// `GlobalModel`/`Project` operations.
#[derive(Debug, Clone, Default)]
pub struct RteConfig {
    /// Open Question 1: the canonical-vendor synonym table is data the
    /// caller supplies; an empty table falls back to case-insensitive
    /// exact comparison.
    pub vendor_table: CanonicalVendorTable,
    /// `(toolchain_name, version) -> install_root`, looked up by semver
    /// range (§6.3); purely data-driven, no directory scanning here.
    pub toolchains: Vec<ToolchainEntry>,
    pub package_filter: PackageFilter,
}

impl RteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the highest-version installed toolchain entry whose name
    /// matches and whose version satisfies `range`.
    pub fn find_toolchain(&self, name: &str, range: &semver::VersionReq) -> Option<&ToolchainEntry> {
        self.toolchains
            .iter()
            .filter(|t| t.name == name && range.matches(&t.version))
            .max_by(|a, b| a.version.cmp(&b.version))
    }
}

/// `(toolchain_name, version) -> install_root` is mirrored one level up
/// as a plain map for callers that already resolved an exact version
/// rather than a range.
pub fn toolchain_install_root<'a>(config: &'a RteConfig, name: &str, version: &semver::Version) -> Option<&'a str> {
    config
        .toolchains
        .iter()
        .find(|t| t.name == name && &t.version == version)
        .map(|t| t.install_root.as_str())
}
