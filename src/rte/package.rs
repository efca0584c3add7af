//! Package model (§3.6, L2), grounded on `RtePackage.h`/`RtePackage.cpp`
//! and the `packchk`-style checks in `CheckConditions.cpp` (§9 supplement
//! 5, supplement 7).

use std::collections::HashMap;

use crate::item::{ItemHandle, ItemPayload, ItemStore};

/// A package's lifecycle state (§3.6, §9 supplement 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageState {
    Installed,
    Available,
    Downloaded,
    ExplicitPath,
    Generated,
}

impl PackageState {
    pub fn is_installed(self) -> bool {
        matches!(self, PackageState::Installed | PackageState::ExplicitPath | PackageState::Generated)
    }

    pub fn is_available_for_install(self) -> bool {
        matches!(self, PackageState::Available | PackageState::Downloaded)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseData {
    pub version: String,
    pub deprecated: bool,
}

pub(crate) fn construct_release(store: &mut ItemStore, handle: ItemHandle) {
    let version = store.get_attribute(handle, "version").unwrap_or("").to_string();
    let deprecated = store.get_attribute(handle, "deprecated").is_some();
    if let ItemPayload::Release(r) = store.payload_mut(handle) {
        r.version = version;
        r.deprecated = deprecated;
    }
}

/// Derived package fields computed during `construct()` (§4.4): `version`
/// from the newest release, `deprecated`/`dominating` flags, `common_id` =
/// `Vendor.Name`, `id` = `common_id[.version]`.
#[derive(Debug, Clone, Default)]
pub struct PackageMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub deprecated: bool,
    pub dominating: bool,
    pub common_id: String,
    pub id: String,
    pub state: Option<PackageState>,
}

/// Package-level construction (§4.4): normalises `name`/`vendor`/`url`,
/// sets `version` from the newest `<releases>` entry, `deprecated` from
/// that release, `dominating` from the presence of a top-level
/// `<dominate>` child, and builds `common_id`/`id`.
///
/// This is stored in the package's attribute map (not a separate typed
/// payload: `<package>` itself stays `ItemPayload::Generic`, mirroring how
/// the rest of the item tree keeps the attribute map as the lossless
/// source of truth — see §9 "dynamic typing" design note) under the
/// `__common_id`/`__id` synthetic keys, and returned as a `PackageMeta` for
/// callers who want it typed.
pub(crate) fn construct_package(store: &mut ItemStore, handle: ItemHandle) {
    let vendor = store.get_attribute(handle, "vendor").unwrap_or("").to_string();
    let name = store.get_attribute(handle, "name").unwrap_or("").to_string();

    let newest_release = newest_release(store, handle);
    let version = newest_release
        .map(|r| match store.payload(r) {
            ItemPayload::Release(rel) => rel.version.clone(),
            _ => String::new(),
        })
        .unwrap_or_default();
    let deprecated = newest_release
        .map(|r| matches!(store.payload(r), ItemPayload::Release(rel) if rel.deprecated))
        .unwrap_or(false);
    let dominating = store.children_with_tag(handle, "dominate").next().is_some();

    let common_id = format!("{vendor}.{name}");
    let id = if version.is_empty() {
        common_id.clone()
    } else {
        format!("{common_id}.{version}")
    };

    store.add_attribute(handle, "__common_id", &common_id, true);
    store.add_attribute(handle, "__id", &id, true);
    store.add_attribute(handle, "__version", &version, true);
    store.add_attribute(handle, "__deprecated", if deprecated { "1" } else { "0" }, true);
    store.add_attribute(handle, "__dominating", if dominating { "1" } else { "0" }, true);
}

fn newest_release(store: &ItemStore, package: ItemHandle) -> Option<ItemHandle> {
    let releases = store.children_with_tag(package, "releases").next()?;
    store
        .children_with_tag(releases, "release")
        .max_by(|a, b| {
            let va = release_version(store, *a);
            let vb = release_version(store, *b);
            semver_compare(&va, &vb)
        })
}

fn release_version(store: &ItemStore, release: ItemHandle) -> String {
    match store.payload(release) {
        ItemPayload::Release(r) => r.version.clone(),
        _ => String::new(),
    }
}

fn semver_compare(a: &str, b: &str) -> std::cmp::Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

pub fn meta(store: &ItemStore, handle: ItemHandle) -> PackageMeta {
    PackageMeta {
        vendor: store.get_attribute(handle, "vendor").unwrap_or("").to_string(),
        name: store.get_attribute(handle, "name").unwrap_or("").to_string(),
        version: store.get_attribute(handle, "__version").unwrap_or("").to_string(),
        deprecated: store.get_attribute(handle, "__deprecated") == Some("1"),
        dominating: store.get_attribute(handle, "__dominating") == Some("1"),
        common_id: store.get_attribute(handle, "__common_id").unwrap_or("").to_string(),
        id: store.get_attribute(handle, "__id").unwrap_or("").to_string(),
        state: None,
    }
}

/// `validate()` on a package additionally runs the `packchk`-style checks
/// (§9 supplement 5): duplicate condition IDs within this pack (advisory,
/// first wins) and expressions with an empty attribute map (structural).
pub(crate) fn validate_package(store: &ItemStore, handle: ItemHandle) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen: HashMap<String, ItemHandle> = HashMap::new();
    collect_conditions(store, handle, &mut seen, &mut errors);
    errors
}

fn collect_conditions(
    store: &ItemStore,
    node: ItemHandle,
    seen: &mut HashMap<String, ItemHandle>,
    errors: &mut Vec<String>,
) {
    for child in store.children(node).to_vec() {
        if store.tag(child) == "condition" {
            let id = store.get_attribute(child, "id").unwrap_or("").to_string();
            if !id.is_empty() {
                if seen.contains_key(&id) {
                    errors.push(format!("duplicate condition id '{id}' (first definition kept) #M521"));
                } else {
                    seen.insert(id, child);
                }
            }
            if store.children(child).is_empty() {
                errors.push(format!(
                    "condition '{}' has no accept/require/deny children",
                    store.get_attribute(child, "id").unwrap_or("")
                ));
            }
        }
        collect_conditions(store, child, seen, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_id_combines_vendor_name_version() {
        let mut store = ItemStore::new();
        let pkg = store.create_child(None, "package");
        store.add_attribute(pkg, "vendor", "ARM", true);
        store.add_attribute(pkg, "name", "CMSIS", true);
        let releases = store.create_child(Some(pkg), "releases");
        let rel = store.create_child(Some(releases), "release");
        store.add_attribute(rel, "version", "5.9.0", true);
        construct_release(&mut store, rel);

        construct_package(&mut store, pkg);
        let m = meta(&store, pkg);
        assert_eq!(m.common_id, "ARM.CMSIS");
        assert_eq!(m.id, "ARM.CMSIS.5.9.0");
        assert_eq!(m.version, "5.9.0");
    }

    #[test]
    fn newest_release_wins_over_version_order() {
        let mut store = ItemStore::new();
        let pkg = store.create_child(None, "package");
        store.add_attribute(pkg, "vendor", "ARM", true);
        store.add_attribute(pkg, "name", "CMSIS", true);
        let releases = store.create_child(Some(pkg), "releases");
        for v in ["5.9.0", "6.0.0", "5.10.0"] {
            let rel = store.create_child(Some(releases), "release");
            store.add_attribute(rel, "version", v, true);
            construct_release(&mut store, rel);
        }
        construct_package(&mut store, pkg);
        assert_eq!(meta(&store, pkg).version, "6.0.0");
    }

    #[test]
    fn duplicate_condition_ids_flagged_first_wins() {
        let mut store = ItemStore::new();
        let pkg = store.create_child(None, "package");
        let conditions = store.create_child(Some(pkg), "conditions");
        let c1 = store.create_child(Some(conditions), "condition");
        store.add_attribute(c1, "id", "Foo", true);
        store.create_child(Some(c1), "require");
        let c2 = store.create_child(Some(conditions), "condition");
        store.add_attribute(c2, "id", "Foo", true);
        store.create_child(Some(c2), "require");

        let errors = validate_package(&store, pkg);
        assert!(errors.iter().any(|e| e.contains("duplicate condition id 'Foo'")));
    }
}
