//! Global model (§3.8, §4.5, L2), grounded on `RteModel.h`/`RteModel.cpp`'s
//! `RteGlobalModel`, `RteModel::InsertComponent` and the package filter.

use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use rte_util::{compare_pack_ids, PackKey};

use crate::item::{ItemHandle, ItemStore};
use crate::package;

/// The three orthogonal package-filter knobs (§3.8).
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    /// Use the latest installed release of every pack.
    pub use_all_packs: bool,
    /// Explicit pinned pack IDs (`Vendor.Name.Version`).
    pub selected_packs: Vec<String>,
    /// Common IDs (`Vendor.Name`) whose latest *available* release is used.
    pub latest_packs: Vec<String>,
}

impl PackageFilter {
    /// Whether `package_id`/`common_id` survives this filter, given the
    /// latest-installed package for `common_id` (the default applied only
    /// when knobs 1-3 leave the common ID unconstrained, §3.8).
    fn accepts(&self, common_id: &str, package_id: &str, is_latest_installed: bool) -> bool {
        let prefix = format!("{common_id}.");
        if let Some(pinned) = self.selected_packs.iter().find(|p| p.starts_with(&prefix)) {
            return pinned.as_str() == package_id;
        }
        if self.latest_packs.iter().any(|c| c == common_id) {
            return is_latest_installed;
        }
        is_latest_installed
    }
}

/// One loaded pack: its item-tree handle plus the arena it lives in. The
/// global model does not own these arenas across a filter boundary — a
/// `Target` holds weak references by ID (§5 "Resource lifecycles").
pub struct LoadedPackage {
    pub store: ItemStore,
    pub root: ItemHandle,
}

/// Aggregates all loaded packs (§4.5): pack-version ordering,
/// latest-per-family index, and the indexes that survive filtering.
#[derive(Default)]
pub struct GlobalModel {
    pub packages: Vec<LoadedPackage>,
}

impl GlobalModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, store: ItemStore, root: ItemHandle) {
        self.packages.push(LoadedPackage { store, root });
    }

    /// `packages` sorted by `compare_pack_ids`: alpha-numeric ascending on
    /// `common_id` (`"Keil"`-prefixed common IDs sort last), newer version
    /// first within equal `common_id`.
    pub fn sorted_package_indices(&self) -> Vec<usize> {
        let mut keyed: Vec<(usize, PackKey)> = self
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let m = package::meta(&p.store, p.root);
                let version = semver::Version::parse(&m.version).unwrap_or(semver::Version::new(0, 0, 0));
                (i, PackKey::new(m.common_id, version))
            })
            .collect();
        keyed.sort_by(|a, b| compare_pack_ids(&a.1, &b.1));
        keyed.into_iter().map(|(i, _)| i).collect()
    }

    /// The latest-installed package index per `common_id`, used as the
    /// filter's default fallback (§3.8).
    pub fn latest_installed_per_common_id(&self) -> HashMap<String, usize> {
        let mut latest: HashMap<String, (usize, semver::Version)> = HashMap::new();
        for i in self.sorted_package_indices() {
            let m = package::meta(&self.packages[i].store, self.packages[i].root);
            let version = semver::Version::parse(&m.version).unwrap_or(semver::Version::new(0, 0, 0));
            latest
                .entry(m.common_id)
                .and_modify(|(idx, v)| {
                    if version > *v {
                        *idx = i;
                        *v = version.clone();
                    }
                })
                .or_insert((i, version));
        }
        latest.into_iter().map(|(k, (i, _))| (k, i)).collect()
    }

    /// `filter_model` (§4.5): walks packages in pack-priority order, drops
    /// those failing `filter`, and returns the surviving package indices
    /// in priority order (highest-priority first) — callers build the
    /// per-aggregate-ID component index from this with [`insert_component`]
    /// precedence (dominating-pack > same-pack-as-device > newer-version).
    pub fn filter_model(&self, filter: &PackageFilter) -> Vec<usize> {
        let latest = self.latest_installed_per_common_id();
        self.sorted_package_indices()
            .into_iter()
            .filter(|&i| {
                let m = package::meta(&self.packages[i].store, self.packages[i].root);
                let is_latest = latest.get(&m.common_id) == Some(&i);
                filter.accepts(&m.common_id, &m.id, is_latest)
            })
            .collect()
    }
}

/// `insert_component` (§4.5): choose the winning concrete component when
/// two packs both contribute the same aggregate ID. Precedence: dominating
/// pack wins outright; if both (or neither) dominate, higher version wins;
/// if versions tie, the pack earlier in priority order (closer to the
/// device's own pack) wins — callers pass `current_is_device_pack` for
/// that tie-break per §9 Open Question 3.
pub fn insert_component(
    incumbent_dominates: bool,
    incumbent_version: &str,
    candidate_dominates: bool,
    candidate_version: &str,
) -> Ordering {
    match (incumbent_dominates, candidate_dominates) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => {
            let iv = semver::Version::parse(incumbent_version).unwrap_or(semver::Version::new(0, 0, 0));
            let cv = semver::Version::parse(candidate_version).unwrap_or(semver::Version::new(0, 0, 0));
            iv.cmp(&cv)
        }
    }
}

/// The component/API index built by re-inserting surviving packs'
/// components after a filter pass, keyed by aggregate ID (§4.5 step 2).
#[derive(Default)]
pub struct ComponentIndex {
    /// aggregate id -> (pack index, component item handle, dominates, version)
    pub winners: IndexMap<String, (usize, ItemHandle, bool, String)>,
}

impl ComponentIndex {
    pub fn insert(&mut self, aggregate_id: String, pack_index: usize, component: ItemHandle, dominates: bool, version: String) {
        match self.winners.get(&aggregate_id) {
            Some((_, _, inc_dom, inc_ver)) => {
                if insert_component(*inc_dom, inc_ver, dominates, &version) == Ordering::Less {
                    self.winners.insert(aggregate_id, (pack_index, component, dominates, version));
                }
            }
            None => {
                self.winners.insert(aggregate_id, (pack_index, component, dominates, version));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominating_pack_wins_regardless_of_version() {
        assert_eq!(insert_component(true, "1.0.0", false, "9.0.0"), Ordering::Greater);
    }

    #[test]
    fn higher_version_wins_when_neither_dominates() {
        assert_eq!(insert_component(false, "1.0.0", false, "2.0.0"), Ordering::Less);
    }

    #[test]
    fn component_index_keeps_dominating_incumbent() {
        let mut idx = ComponentIndex::default();
        let mut store = ItemStore::new();
        let h1 = store.create_child(None, "component");
        let h2 = store.create_child(None, "component");
        idx.insert("ARM::Device:Startup".into(), 0, h1, true, "1.0.0".into());
        idx.insert("ARM::Device:Startup".into(), 1, h2, false, "2.0.0".into());
        assert_eq!(idx.winners["ARM::Device:Startup"].1, h1);
    }
}
