//! Target & Project (§3.7, §4.7, L3), grounded on `RteCprjTarget.h`,
//! `RteCprjProject.cpp` and the `CbuildModel`-style instance bookkeeping
//! (§9 supplement 6).

use indexmap::IndexMap;

use crate::component;
use crate::item::{ItemHandle, ItemStore};
use crate::model::{ComponentIndex, GlobalModel, PackageFilter};
use crate::resolver::{ComponentAggregate, DependencySolver};

/// A component selection persisted in the project file (§3.7): its
/// attributes, per-target resolved component pointer, resolved status,
/// and instance count (for `maxInstances > 1` components).
#[derive(Debug, Clone, Default)]
pub struct ComponentInstance {
    pub aggregate_id: String,
    pub attributes: IndexMap<String, String>,
    pub resolved_component: Option<ItemHandle>,
    pub resolved: bool,
    pub instance_count: u32,
}

/// A per-file record tracking when a newer version of a config file is
/// available in the pack than the one copied into the project (§3.7, §9
/// supplement 6).
#[derive(Debug, Clone, Default)]
pub struct FileInstance {
    pub pack_path: String,
    pub project_path: String,
    pub original_version: String,
    pub instance_version: String,
}

impl FileInstance {
    /// Whether the pack carries a newer version of this config file than
    /// the one the project was instantiated against.
    pub fn update_available(&self) -> bool {
        let orig = semver::Version::parse(&self.original_version);
        let inst = semver::Version::parse(&self.instance_version);
        match (orig, inst) {
            (Ok(o), Ok(i)) => i > o,
            _ => self.instance_version != self.original_version,
        }
    }
}

/// One (device, toolchain) target (§3.7, §4.7): a filtered model view plus
/// the selection and solver state scoped to it.
pub struct Target {
    pub device_name: String,
    pub toolchain: String,
    pub filter: PackageFilter,
    /// Pack indices (into the owning [`GlobalModel`]) that survive this
    /// target's filter, in priority order.
    pub filtered_packages: Vec<usize>,
    pub solver: DependencySolver,
    pub component_instances: Vec<ComponentInstance>,
    pub file_instances: Vec<FileInstance>,
}

impl Target {
    pub fn new(device_name: impl Into<String>, toolchain: impl Into<String>, filter: PackageFilter) -> Self {
        Self {
            device_name: device_name.into(),
            toolchain: toolchain.into(),
            filter,
            filtered_packages: Vec::new(),
            solver: DependencySolver::new(IndexMap::new()),
            component_instances: Vec::new(),
            file_instances: Vec::new(),
        }
    }

    /// `update_filter_model()` (§4.7): recomputes the filtered package set
    /// and rebuilds the aggregate index from the winning components of
    /// each surviving pack (§4.6 build phase).
    #[tracing::instrument(skip(self, global))]
    pub fn update_filter_model(&mut self, global: &GlobalModel) {
        self.filtered_packages = global.filter_model(&self.filter);

        let mut index = ComponentIndex::default();
        for &pack_idx in &self.filtered_packages {
            let pkg = &global.packages[pack_idx];
            let meta = crate::package::meta(&pkg.store, pkg.root);
            let Some(components_container) = pkg.store.children_with_tag(pkg.root, "components").next() else {
                continue;
            };
            for comp in all_components(&pkg.store, components_container) {
                let agg_id = component::aggregate_id(&pkg.store, comp);
                index.insert(agg_id, pack_idx, comp, meta.dominating, meta.version.clone());
            }
        }

        let mut aggregates: IndexMap<String, ComponentAggregate> = IndexMap::new();
        for (agg_id, (pack_idx, _component, _dom, _ver)) in &index.winners {
            let pkg = &global.packages[*pack_idx];
            let Some(components_container) = pkg.store.children_with_tag(pkg.root, "components").next() else {
                continue;
            };
            let mut agg = ComponentAggregate::new(agg_id.clone());
            for comp in all_components(&pkg.store, components_container) {
                if component::aggregate_id(&pkg.store, comp) == *agg_id {
                    agg.add_member(&pkg.store, comp);
                }
            }
            agg.select_default();
            aggregates.insert(agg_id.clone(), agg);
        }

        self.solver = DependencySolver::new(aggregates);
    }

    /// `Target.select_component(aggregate, count)` (§6.5): marks an
    /// aggregate selected with the given instance count, clamped to its
    /// `max_instances` bound (§8.1 invariant).
    pub fn select_component(&mut self, aggregate_id: &str, count: u32) -> bool {
        let Some(agg) = self.solver.aggregates.get_mut(aggregate_id) else {
            return false;
        };
        agg.select_default();
        agg.n_selected = count.min(agg.max_instances).max(if count > 0 { 1 } else { 0 });
        true
    }
}

fn all_components(store: &ItemStore, components_container: ItemHandle) -> Vec<ItemHandle> {
    let mut out = Vec::new();
    for child in store.children(components_container).to_vec() {
        match store.tag(child) {
            "component" => out.push(child),
            "bundle" => out.extend(store.children_with_tag(child, "component")),
            _ => {}
        }
    }
    out
}

/// A Project owns one or more Targets (§3.7).
#[derive(Default)]
pub struct Project {
    pub targets: IndexMap<String, Target>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(&mut self, name: impl Into<String>, target: Target) {
        self.targets.insert(name.into(), target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemStore;
    use crate::model::LoadedPackage;

    fn sample_package() -> LoadedPackage {
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

        LoadedPackage { store, root: pkg }
    }

    #[test]
    fn update_filter_model_builds_one_aggregate_from_single_pack() {
        let mut global = GlobalModel::new();
        let pkg = sample_package();
        global.add_package(pkg.store, pkg.root);

        let mut target = Target::new("ARMCM3", "GCC", PackageFilter { use_all_packs: true, ..Default::default() });
        target.update_filter_model(&global);

        assert_eq!(target.solver.aggregates.len(), 1);
        assert!(target.solver.aggregates.contains_key("ARM::Device:Startup"));
    }

    #[test]
    fn select_component_clamps_to_max_instances() {
        let mut global = GlobalModel::new();
        let pkg = sample_package();
        global.add_package(pkg.store, pkg.root);
        let mut target = Target::new("ARMCM3", "GCC", PackageFilter { use_all_packs: true, ..Default::default() });
        target.update_filter_model(&global);

        assert!(target.select_component("ARM::Device:Startup", 5));
        let agg = &target.solver.aggregates["ARM::Device:Startup"];
        assert_eq!(agg.n_selected, 1); // max_instances defaults to 1
    }

    #[test]
    fn file_instance_detects_available_update() {
        let fi = FileInstance {
            pack_path: "p".into(),
            project_path: "q".into(),
            original_version: "1.0.0".into(),
            instance_version: "1.1.0".into(),
        };
        assert!(fi.update_available());
    }
}
