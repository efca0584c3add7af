//! Component resolver & dependency solver (§4.6, L3), grounded on
//! `RteComponent.cpp`'s `RteComponentAggregate`, `RteDependencySolver` and
//! `RteItem::GetComponentAggregates`.

use std::collections::HashMap;

use indexmap::IndexMap;
use rte_platform::{wildcard_match, CanonicalVendorTable};

use crate::condition::{ConditionContext, ConditionResult, DependencyEvaluator};
use crate::item::{ItemHandle, ItemPayload, ItemStore};

/// The selection unit (§4.6): all concrete components sharing one
/// aggregate ID, grouped by variant → version.
#[derive(Debug, Clone, Default)]
pub struct ComponentAggregate {
    pub aggregate_id: String,
    /// variant name ("" for the unnamed variant) -> version -> component item
    pub variants: IndexMap<String, IndexMap<String, ItemHandle>>,
    pub default_variant: Option<String>,
    pub selected_variant: Option<String>,
    pub selected_version: Option<String>,
    pub n_selected: u32,
    pub max_instances: u32,
    /// Set when this aggregate was populated from a `generator=` component:
    /// only generator-labeled members are retained (§4.6 build phase).
    pub is_generated: bool,
    /// A custom aggregate is one the user typed by hand in the project
    /// file with no catalog match; the solver never auto-selects it.
    pub is_custom: bool,
    /// Whether this aggregate originates from the pack that provides the
    /// target's selected device — used by the single-aggregate rule
    /// (§4.6, §9 Open Question 3).
    pub from_device_pack: bool,
    pub text: Option<String>,
}

impl ComponentAggregate {
    pub fn new(aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            max_instances: 1,
            ..Default::default()
        }
    }

    pub fn add_member(&mut self, store: &ItemStore, component: ItemHandle) {
        let variant = store.get_attribute(component, "Cvariant").unwrap_or("").to_string();
        let version = store.get_attribute(component, "Cversion").unwrap_or("").to_string();
        let is_default = store.get_attribute(component, "isDefaultVariant") == Some("1");
        let generator = store.get_attribute(component, "generator").is_some();

        if generator && !self.is_generated {
            self.variants.clear();
            self.is_generated = true;
        } else if !generator && self.is_generated {
            return;
        }

        if is_default {
            self.default_variant = Some(variant.clone());
        }
        if let ItemPayload::Component(c) = store.payload(component) {
            self.max_instances = self.max_instances.max(c.max_instances);
        }
        self.variants.entry(variant).or_default().insert(version, component);
    }

    /// The concrete component currently selected, if any.
    pub fn selected_component(&self) -> Option<ItemHandle> {
        let variant = self.selected_variant.clone().unwrap_or_default();
        let version = self.selected_version.as_deref()?;
        self.variants.get(&variant)?.get(version).copied()
    }

    /// Picks the default (or sole, or latest) variant/version when none is
    /// explicitly selected yet.
    pub fn select_default(&mut self) {
        if self.selected_variant.is_some() && self.selected_version.is_some() {
            return;
        }
        let variant = self
            .default_variant
            .clone()
            .or_else(|| self.variants.keys().next().cloned())
            .unwrap_or_default();
        let Some(versions) = self.variants.get(&variant) else {
            return;
        };
        let latest = versions
            .keys()
            .max_by(|a, b| parse_version(a).cmp(&parse_version(b)))
            .cloned();
        self.selected_variant = Some(variant);
        self.selected_version = latest;
    }

    /// Finds a member matching a component-dependency expression's
    /// wildcard attributes (variant/version), used by the resolution loop
    /// to re-point the selection when the current component no longer
    /// matches.
    pub fn find_component(&self, expr_variant: Option<&str>, expr_version: Option<&str>) -> Option<(String, String)> {
        for (variant, versions) in &self.variants {
            if let Some(wv) = expr_variant {
                if !wildcard_match(wv, variant) {
                    continue;
                }
            }
            for version in versions.keys() {
                if let Some(wver) = expr_version {
                    if !wildcard_match(wver, version) {
                        continue;
                    }
                }
                return Some((variant.clone(), version.clone()));
            }
        }
        None
    }
}

fn parse_version(s: &str) -> semver::Version {
    semver::Version::parse(s).unwrap_or(semver::Version::new(0, 0, 0))
}

/// Per-aggregate and overall outcome of a dependency evaluation or
/// resolution pass (§4.6, §7: "resolver returns a `DependencyResult` tree
/// whose leaves carry the kind").
#[derive(Debug, Clone)]
pub struct DependencyResult {
    pub aggregate_id: String,
    pub result: ConditionResult,
    /// When ambiguous, the candidate aggregate IDs the expression matched.
    pub candidates: Vec<String>,
    pub message: String,
}

/// aggregate_id shape: `Cvendor::Cclass[&Cbundle]:Cgroup[:Csub]`.
fn aggregate_id_matches(aggregate_id: &str, want: impl Fn(&str) -> Option<&str>) -> bool {
    let Some((_, rest)) = aggregate_id.split_once("::") else { return false };
    let (class_part, group_part) = rest.split_once(':').unwrap_or((rest, ""));
    let (class, bundle) = class_part.split_once('&').unwrap_or((class_part, ""));
    let mut group_parts = group_part.splitn(2, ':');
    let group = group_parts.next().unwrap_or("");
    let sub = group_parts.next().unwrap_or("");

    for (key, actual) in [("Cclass", class), ("Cbundle", bundle), ("Cgroup", group), ("Csub", sub)] {
        if let Some(w) = want(key) {
            if !wildcard_match(w, actual) {
                return false;
            }
        }
    }
    true
}

fn component_matches(store: &ItemStore, component: ItemHandle, want: impl Fn(&str) -> Option<&str>) -> bool {
    for key in ["Cclass", "Cbundle", "Cgroup", "Csub", "Cvariant", "Cversion"] {
        if let Some(w) = want(key) {
            let actual = store.get_attribute(component, key).unwrap_or("");
            if !wildcard_match(w, actual) {
                return false;
            }
        }
    }
    true
}

fn matching_aggregates(
    aggregates: &IndexMap<String, ComponentAggregate>,
    store: &ItemStore,
    expr: ItemHandle,
) -> Vec<String> {
    let want = |name: &str| store.get_attribute(expr, name);
    aggregates
        .values()
        .filter(|a| match a.selected_component() {
            Some(c) => component_matches(store, c, want),
            None => aggregate_id_matches(&a.aggregate_id, want),
        })
        .map(|a| a.aggregate_id.clone())
        .collect()
}

/// §4.6 "single-aggregate rule": prefer the unique aggregate originating
/// from the target's device package; else, if exactly one candidate
/// exists, it wins; else ambiguous (`None`).
fn resolve_single_aggregate(aggregates: &IndexMap<String, ComponentAggregate>, candidates: &[String]) -> Option<String> {
    if candidates.len() == 1 {
        return Some(candidates[0].clone());
    }
    let device_pack_candidates: Vec<&String> = candidates
        .iter()
        .filter(|id| aggregates.get(*id).map(|a| a.from_device_pack).unwrap_or(false))
        .collect();
    if device_pack_candidates.len() == 1 {
        return Some(device_pack_candidates[0].clone());
    }
    None
}

/// Implements [`DependencyEvaluator`] over a read-only view of the
/// target's aggregates, so the condition engine can resolve `'C'`-domain
/// (component-dependency) expressions without the solver itself needing
/// mutable access mid-evaluation (§4.6: "delegate to the solver").
pub struct AggregateView<'a> {
    pub aggregates: &'a IndexMap<String, ComponentAggregate>,
}

impl<'a> DependencyEvaluator for AggregateView<'a> {
    fn evaluate_component_dependency(
        &mut self,
        store: &ItemStore,
        expr: ItemHandle,
        _target_attrs: &HashMap<String, String>,
    ) -> ConditionResult {
        let candidates = matching_aggregates(self.aggregates, store, expr);
        if candidates.is_empty() {
            return ConditionResult::Missing;
        }
        let winner = resolve_single_aggregate(self.aggregates, &candidates);
        match winner {
            Some(id) => {
                let agg = &self.aggregates[&id];
                if agg.n_selected > 0 {
                    ConditionResult::Fulfilled
                } else {
                    ConditionResult::Selectable
                }
            }
            None => ConditionResult::Conflict,
        }
    }
}

/// The resolver-facing owner of a target's selected aggregates (§4.6,
/// §4.7). Drives the fixed-point `resolve_dependencies` loop; delegates
/// expression-level matching to [`AggregateView`].
pub struct DependencySolver {
    pub aggregates: IndexMap<String, ComponentAggregate>,
    /// Hard iteration cap reached on the last `resolve_dependencies` call
    /// (§5 "Concurrency & resource model": bounded by the count of
    /// `SELECTABLE` dependencies at loop start).
    pub iteration_cap: usize,
}

impl DependencySolver {
    pub fn new(aggregates: IndexMap<String, ComponentAggregate>) -> Self {
        Self {
            aggregates,
            iteration_cap: 0,
        }
    }

    /// `evaluate_dependencies` (§4.6): evaluate every selected aggregate's
    /// component condition under the dependency context; overall result is
    /// the minimum of all per-aggregate results (computed by the caller).
    pub fn evaluate_dependencies(
        &self,
        store: &mut ItemStore,
        target_attrs: HashMap<String, String>,
        vendor_table: &CanonicalVendorTable,
        condition_lookup: &HashMap<String, ItemHandle>,
        filter_results: &HashMap<ItemHandle, ConditionResult>,
        condition_of: impl Fn(&ItemStore, ItemHandle) -> Option<ItemHandle>,
    ) -> Vec<DependencyResult> {
        let view = AggregateView { aggregates: &self.aggregates };
        let mut ctx = ConditionContext::new_dependency(target_attrs, vendor_table, condition_lookup, view, filter_results);

        let mut results = Vec::new();
        for (id, agg) in &self.aggregates {
            if agg.n_selected == 0 {
                continue;
            }
            let Some(component) = agg.selected_component() else {
                results.push(DependencyResult {
                    aggregate_id: id.clone(),
                    result: ConditionResult::Missing,
                    candidates: vec![],
                    message: format!("no component selected for aggregate '{id}'"),
                });
                continue;
            };
            let result = match condition_of(store, component) {
                Some(cond) => ctx.evaluate(store, cond),
                None => ConditionResult::Fulfilled,
            };
            results.push(DependencyResult {
                aggregate_id: id.clone(),
                result,
                candidates: vec![],
                message: String::new(),
            });
        }
        results
    }

    /// `resolve_dependencies` loop (§4.6): re-evaluate, auto-select any
    /// aggregate with exactly one non-custom candidate that a pending
    /// component-dependency expression resolves to, repeat until no
    /// progress or the iteration cap is hit.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_dependencies(
        &mut self,
        store: &mut ItemStore,
        target_attrs: HashMap<String, String>,
        vendor_table: &CanonicalVendorTable,
        condition_lookup: &HashMap<String, ItemHandle>,
        filter_results: &HashMap<ItemHandle, ConditionResult>,
        condition_of: impl Fn(&ItemStore, ItemHandle) -> Option<ItemHandle> + Copy,
        pending_exprs: &[ItemHandle],
    ) -> Vec<DependencyResult> {
        self.iteration_cap = pending_exprs.len().max(1);

        let mut last_results = Vec::new();
        for _ in 0..self.iteration_cap {
            last_results = self.evaluate_dependencies(
                store,
                target_attrs.clone(),
                vendor_table,
                condition_lookup,
                filter_results,
                condition_of,
            );

            let mut progressed = false;
            for &expr in pending_exprs {
                let candidates = matching_aggregates(&self.aggregates, store, expr);
                let Some(winner_id) = resolve_single_aggregate(&self.aggregates, &candidates) else {
                    continue;
                };
                let expr_variant = store.get_attribute(expr, "Cvariant");
                let expr_version = store.get_attribute(expr, "Cversion");
                let Some(agg) = self.aggregates.get_mut(&winner_id) else { continue };
                if agg.is_custom {
                    continue;
                }
                if let Some((variant, version)) = agg.find_component(expr_variant, expr_version) {
                    if agg.selected_variant.as_deref() != Some(&variant) || agg.selected_version.as_deref() != Some(&version) {
                        agg.selected_variant = Some(variant);
                        agg.selected_version = Some(version);
                        progressed = true;
                    }
                }
                if agg.n_selected == 0 {
                    agg.n_selected = 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        last_results
    }
}

/// Overall result across every evaluated aggregate: the minimum, per §4.6.
pub fn overall_result(results: &[DependencyResult]) -> ConditionResult {
    results.iter().map(|r| r.result).min().unwrap_or(ConditionResult::Fulfilled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(store: &mut ItemStore, attrs: &[(&str, &str)]) -> ItemHandle {
        let h = store.create_child(None, "component");
        for (k, v) in attrs {
            store.add_attribute(h, k, v, true);
        }
        crate::component::construct_component(store, h);
        h
    }

    #[test]
    fn aggregate_selects_default_variant() {
        let mut store = ItemStore::new();
        let mut agg = ComponentAggregate::new("ARM::Network:Core");
        let static_c = component(&mut store, &[("Cvariant", "Static"), ("Cversion", "1.0.0")]);
        let dynamic_c = component(
            &mut store,
            &[("Cvariant", "Dynamic"), ("Cversion", "1.0.0"), ("isDefaultVariant", "1")],
        );
        agg.add_member(&store, static_c);
        agg.add_member(&store, dynamic_c);
        agg.select_default();
        assert_eq!(agg.selected_variant.as_deref(), Some("Dynamic"));
    }

    #[test]
    fn generator_labeled_components_exclude_non_generated_members() {
        let mut store = ItemStore::new();
        let mut agg = ComponentAggregate::new("ARM::Device:Config");
        let plain = component(&mut store, &[("Cversion", "1.0.0")]);
        let generated = component(&mut store, &[("Cversion", "1.0.0"), ("generator", "DFP")]);
        agg.add_member(&store, plain);
        agg.add_member(&store, generated);
        assert_eq!(agg.variants[""].len(), 1);
        assert_eq!(agg.variants[""][&"1.0.0".to_string()], generated);
    }

    #[test]
    fn single_aggregate_rule_prefers_unique_match() {
        let mut aggregates = IndexMap::new();
        aggregates.insert("A::X:Y".to_string(), ComponentAggregate::new("A::X:Y"));
        assert_eq!(
            resolve_single_aggregate(&aggregates, &["A::X:Y".to_string()]),
            Some("A::X:Y".to_string())
        );
        assert_eq!(resolve_single_aggregate(&aggregates, &[]), None);
    }

    #[test]
    fn ambiguous_candidates_resolved_by_device_pack_membership() {
        let mut aggregates = IndexMap::new();
        let mut a = ComponentAggregate::new("A::X:Y");
        a.from_device_pack = true;
        let b = ComponentAggregate::new("A::X:Z");
        aggregates.insert("A::X:Y".to_string(), a);
        aggregates.insert("A::X:Z".to_string(), b);
        let candidates = vec!["A::X:Y".to_string(), "A::X:Z".to_string()];
        assert_eq!(resolve_single_aggregate(&aggregates, &candidates), Some("A::X:Y".to_string()));
    }

    #[test]
    fn aggregate_id_wildcard_matches_class_and_group() {
        assert!(aggregate_id_matches("ARM::Device:Startup", |k| match k {
            "Cclass" => Some("Device"),
            "Cgroup" => Some("Start*"),
            _ => None,
        }));
        assert!(!aggregate_id_matches("ARM::Device:Startup", |k| match k {
            "Cgroup" => Some("Config"),
            _ => None,
        }));
    }

    #[test]
    fn overall_result_is_the_minimum() {
        let results = vec![
            DependencyResult { aggregate_id: "a".into(), result: ConditionResult::Fulfilled, candidates: vec![], message: String::new() },
            DependencyResult { aggregate_id: "b".into(), result: ConditionResult::Conflict, candidates: vec![], message: String::new() },
        ];
        assert_eq!(overall_result(&results), ConditionResult::Conflict);
    }
}
