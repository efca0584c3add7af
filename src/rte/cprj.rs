//! CPRJ binder (§3.7, §4.7 "CPRJ binder" row, §6.5 `create_project`),
//! grounded on `CprjFile.h`/`RteCprjProject.cpp`: reads a project
//! description, resolves each named component to a concrete component in
//! the model, reports unresolved/missing, and updates the target's
//! selections.

use crate::target::Target;

/// One `<component Cclass="..." Cgroup="..." .../>` entry named by a CPRJ
/// project file.
#[derive(Debug, Clone, Default)]
pub struct CprjComponentRef {
    pub cvendor: Option<String>,
    pub cclass: String,
    pub cbundle: Option<String>,
    pub cgroup: String,
    pub csub: Option<String>,
    pub cvariant: Option<String>,
    pub cversion: Option<String>,
}

impl CprjComponentRef {
    /// The aggregate ID this reference names, in the shape `component`'s
    /// `aggregate_id` produces: `Cvendor::Cclass[&Cbundle]:Cgroup[:Csub]`.
    pub fn aggregate_id(&self) -> String {
        let vendor = self.cvendor.as_deref().unwrap_or("");
        let mut id = format!("{vendor}::{}", self.cclass);
        if let Some(b) = &self.cbundle {
            id.push('&');
            id.push_str(b);
        }
        id.push(':');
        id.push_str(&self.cgroup);
        if let Some(s) = &self.csub {
            id.push(':');
            id.push_str(s);
        }
        id
    }
}

/// The outcome of binding a CPRJ's component list against a target's
/// filtered model (§6.5 `Project.check_pack_requirements`-adjacent).
#[derive(Debug, Clone, Default)]
pub struct CprjBindResult {
    /// Aggregate IDs successfully matched and selected.
    pub resolved: Vec<String>,
    /// References whose aggregate ID exists in the model, but whose
    /// requested variant/version is not available from any installed
    /// pack (`M511`-adjacent — present in the catalog, not installed).
    pub unresolved: Vec<String>,
    /// References whose aggregate ID has no match at all in the filtered
    /// model (`M511` missing component).
    pub missing: Vec<String>,
}

/// Binds each named component reference to a concrete aggregate in
/// `target`'s filtered model: exact aggregate ID match required; a
/// requested `Cvariant`/`Cversion` must exist among that aggregate's
/// members or the reference is unresolved rather than missing.
pub fn bind_cprj(target: &mut Target, refs: &[CprjComponentRef]) -> CprjBindResult {
    let mut result = CprjBindResult::default();
    for r in refs {
        let agg_id = r.aggregate_id();
        let Some(agg) = target.solver.aggregates.get_mut(&agg_id) else {
            result.missing.push(agg_id);
            continue;
        };

        let variant = r.cvariant.clone().unwrap_or_default();
        let has_variant = agg.variants.contains_key(&variant);
        let version_present = r
            .cversion
            .as_ref()
            .map(|v| agg.variants.get(&variant).map(|m| m.contains_key(v)).unwrap_or(false))
            .unwrap_or(has_variant);

        if !has_variant || !version_present {
            result.unresolved.push(agg_id);
            continue;
        }

        agg.selected_variant = Some(variant);
        if let Some(v) = &r.cversion {
            agg.selected_version = Some(v.clone());
        } else {
            agg.select_default();
        }
        agg.n_selected = agg.n_selected.max(1);
        result.resolved.push(agg_id.clone());
    }
    result
}

/// Produces the `<project>.cpinstall` list (§6.4): `Vendor::Name[@Version]`
/// pack IDs the project requires but the environment lacks. Here,
/// "lacks" means the reference's aggregate ID has no match at all
/// (`missing`), since an `unresolved` reference at least has the
/// right pack installed but the wrong version/variant.
pub fn missing_pack_requirements(refs: &[CprjComponentRef], bind: &CprjBindResult, pack_of: impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut out: Vec<String> = bind
        .missing
        .iter()
        .filter_map(|agg_id| pack_of(agg_id))
        .collect();
    let _ = refs;
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemStore;
    use crate::model::{GlobalModel, PackageFilter};

    fn target_with_component() -> Target {
        let mut store = ItemStore::new();
        let pkg = store.create_child(None, "package");
        store.add_attribute(pkg, "vendor", "ARM", true);
        store.add_attribute(pkg, "name", "CMSIS", true);
        let releases = store.create_child(Some(pkg), "releases");
        let rel = store.create_child(Some(releases), "release");
        store.add_attribute(rel, "version", "5.9.0", true);
        crate::package::construct_release(&mut store, rel);
        crate::package::construct_package(&mut store, pkg);

        let components = store.create_child(Some(pkg), "components");
        let c = store.create_child(Some(components), "component");
        store.add_attribute(c, "Cvendor", "ARM", true);
        store.add_attribute(c, "Cclass", "Device", true);
        store.add_attribute(c, "Cgroup", "Startup", true);
        store.add_attribute(c, "Cversion", "1.0.0", true);
        crate::component::construct_component(&mut store, c);

        let mut global = GlobalModel::new();
        global.add_package(store, pkg);
        let mut target = Target::new("ARMCM3", "GCC", PackageFilter { use_all_packs: true, ..Default::default() });
        target.update_filter_model(&global);
        target
    }

    #[test]
    fn resolves_a_matching_reference() {
        let mut target = target_with_component();
        let refs = vec![CprjComponentRef {
            cvendor: Some("ARM".into()),
            cclass: "Device".into(),
            cgroup: "Startup".into(),
            cversion: Some("1.0.0".into()),
            ..Default::default()
        }];
        let result = bind_cprj(&mut target, &refs);
        assert_eq!(result.resolved, vec!["ARM::Device:Startup".to_string()]);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn reports_missing_for_unknown_aggregate() {
        let mut target = target_with_component();
        let refs = vec![CprjComponentRef {
            cclass: "Network".into(),
            cgroup: "Core".into(),
            ..Default::default()
        }];
        let result = bind_cprj(&mut target, &refs);
        assert_eq!(result.missing, vec!["::Network:Core".to_string()]);
    }

    #[test]
    fn reports_unresolved_for_wrong_version() {
        let mut target = target_with_component();
        let refs = vec![CprjComponentRef {
            cvendor: Some("ARM".into()),
            cclass: "Device".into(),
            cgroup: "Startup".into(),
            cversion: Some("9.9.9".into()),
            ..Default::default()
        }];
        let result = bind_cprj(&mut target, &refs);
        assert_eq!(result.unresolved, vec!["ARM::Device:Startup".to_string()]);
    }
}
