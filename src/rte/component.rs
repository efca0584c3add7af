//! Component / API / Bundle (§3.3), grounded on `RteComponent.cpp`'s
//! `RteComponent::ConstructID`, `GetComponentAggregateID`, `GetApiID` and
//! `RteBundle`.

use crate::item::{ItemHandle, ItemPayload, ItemStore};

/// A component's identifying tuple (§3.3):
/// `(Cvendor, Cclass, Cbundle?, Cgroup, Csub?, Cvariant?, Cversion)`.
#[derive(Debug, Clone, Default)]
pub struct ComponentData {
    pub aggregate_id: String,
    pub unique_id: String,
    pub api_id: Option<String>,
    pub is_default_variant: bool,
    pub generator: Option<String>,
    pub max_instances: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ApiData {
    pub api_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct BundleData {
    pub vendor: String,
    pub version: String,
}

fn attr<'a>(store: &'a ItemStore, h: ItemHandle, name: &str) -> &'a str {
    store.get_attribute(h, name).unwrap_or("")
}

/// **Aggregate ID** = `Cvendor::Cclass[&Cbundle]:Cgroup[:Csub]` — the
/// selection unit (§3.3).
pub fn aggregate_id(store: &ItemStore, h: ItemHandle) -> String {
    let vendor = attr(store, h, "Cvendor");
    let class = attr(store, h, "Cclass");
    let bundle = attr(store, h, "Cbundle");
    let group = attr(store, h, "Cgroup");
    let sub = attr(store, h, "Csub");

    let mut id = format!("{vendor}::{class}");
    if !bundle.is_empty() {
        id.push('&');
        id.push_str(bundle);
    }
    id.push(':');
    id.push_str(group);
    if !sub.is_empty() {
        id.push(':');
        id.push_str(sub);
    }
    id
}

/// **Unique ID** = full ID + `(condition)[packId]`.
pub fn unique_id(store: &ItemStore, h: ItemHandle, condition_id: &str, pack_id: &str) -> String {
    let agg = aggregate_id(store, h);
    let variant = attr(store, h, "Cvariant");
    let version = attr(store, h, "Cversion");
    let mut id = agg;
    if !variant.is_empty() {
        id.push(':');
        id.push_str(variant);
    }
    if !version.is_empty() {
        id.push('@');
        id.push_str(version);
    }
    if !condition_id.is_empty() {
        id.push('(');
        id.push_str(condition_id);
        id.push(')');
    }
    if !pack_id.is_empty() {
        id.push('[');
        id.push_str(pack_id);
        id.push(']');
    }
    id
}

/// **API ID** = `::Cclass:Cgroup(API)[@Capiversion]` (APIs are unversioned
/// at aggregate level).
pub fn api_id(store: &ItemStore, h: ItemHandle) -> String {
    let class = attr(store, h, "Cclass");
    let group = attr(store, h, "Cgroup");
    let version = attr(store, h, "Capiversion");
    let mut id = format!("::{class}:{group}(API)");
    if !version.is_empty() {
        id.push('@');
        id.push_str(version);
    }
    id
}

pub(crate) fn construct_component(store: &mut ItemStore, handle: ItemHandle) {
    if store.tag(handle) == "bundle" {
        let vendor = attr(store, handle, "Cvendor").to_string();
        let version = attr(store, handle, "Cversion").to_string();
        if let ItemPayload::Bundle(b) = store.payload_mut(handle) {
            b.vendor = vendor;
            b.version = version;
        }
        return;
    }

    let agg = aggregate_id(store, handle);
    let unique = unique_id(store, handle, "", "");
    let is_default_variant = attr(store, handle, "isDefaultVariant") == "1";
    let generator = store.get_attribute(handle, "generator").map(str::to_string);
    let max_instances: u32 = store
        .get_attribute(handle, "maxInstances")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    // §9 Open Question 4: generated components default to max_instances=1
    // unless they explicitly declare a larger bound.
    let max_instances = if generator.is_some() && max_instances < 1 { 1 } else { max_instances.max(1) };

    let api_ref = store.children_with_tag(handle, "apis").next().map(|_| api_id(store, handle));

    if let ItemPayload::Component(c) = store.payload_mut(handle) {
        c.aggregate_id = agg;
        c.unique_id = unique;
        c.is_default_variant = is_default_variant;
        c.generator = generator;
        c.max_instances = max_instances;
        c.api_id = api_ref;
    }
}

pub(crate) fn construct_api(store: &mut ItemStore, handle: ItemHandle) {
    let id = api_id(store, handle);
    if let ItemPayload::Api(a) = store.payload_mut(handle) {
        a.api_id = id;
    }
}

pub(crate) fn validate_component(store: &ItemStore, handle: ItemHandle) -> Vec<String> {
    let mut errors = Vec::new();
    if attr(store, handle, "Cclass").is_empty() || attr(store, handle, "Cgroup").is_empty() {
        errors.push("component is missing mandatory Cclass/Cgroup attribute".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(store: &mut ItemStore, attrs: &[(&str, &str)]) -> ItemHandle {
        let h = store.create_child(None, "component");
        for (k, v) in attrs {
            store.add_attribute(h, k, v, true);
        }
        h
    }

    #[test]
    fn aggregate_id_includes_bundle_and_sub() {
        let mut store = ItemStore::new();
        let h = component(
            &mut store,
            &[
                ("Cvendor", "ARM"),
                ("Cclass", "Device"),
                ("Cbundle", "StdPeriph"),
                ("Cgroup", "Startup"),
                ("Csub", "Init"),
            ],
        );
        assert_eq!(aggregate_id(&store, h), "ARM::Device&StdPeriph:Startup:Init");
    }

    #[test]
    fn aggregate_id_without_bundle_or_sub() {
        let mut store = ItemStore::new();
        let h = component(&mut store, &[("Cvendor", "ARM"), ("Cclass", "Device"), ("Cgroup", "Startup")]);
        assert_eq!(aggregate_id(&store, h), "ARM::Device:Startup");
    }

    #[test]
    fn generated_component_defaults_to_single_instance() {
        let mut store = ItemStore::new();
        let h = component(
            &mut store,
            &[
                ("Cvendor", "ARM"),
                ("Cclass", "Device"),
                ("Cgroup", "Config"),
                ("generator", "DFP"),
            ],
        );
        construct_component(&mut store, h);
        match store.payload(h) {
            ItemPayload::Component(c) => assert_eq!(c.max_instances, 1),
            _ => panic!("expected component payload"),
        }
    }
}
