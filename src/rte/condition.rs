//! The condition engine (L1): evaluates `<condition>`/`<accept>`/`<require>`/
//! `<deny>` expression trees in a caching, recursion-protected context.
//! Grounded on `RteCondition.cpp`'s `RteConditionExpression`,
//! `RteDenyExpression`, `RteCondition`, `RteConditionContext` and
//! `RteDependencySolver`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use rte_platform::{dcdecp_match, wildcard_match, CanonicalVendorTable, VendorMatch};

use crate::item::{ItemHandle, ItemStore};

/// The three-valued(-ish) result lattice, ordered worst→best exactly as
/// specified: `R_ERROR < FAILED < MISSING < MISSING_API <
/// MISSING_API_VERSION < UNAVAILABLE < UNAVAILABLE_PACK < INCOMPATIBLE <
/// INCOMPATIBLE_VERSION < INCOMPATIBLE_VARIANT < CONFLICT < INSTALLED <
/// SELECTABLE < FULFILLED < IGNORED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionResult {
    RError,
    Failed,
    Missing,
    MissingApi,
    MissingApiVersion,
    Unavailable,
    UnavailablePack,
    Incompatible,
    IncompatibleVersion,
    IncompatibleVariant,
    Conflict,
    Installed,
    Selectable,
    Fulfilled,
    Ignored,
}

impl ConditionResult {
    pub fn is_error(self) -> bool {
        self == ConditionResult::RError
    }

    /// Whether this is a "good enough to use" outcome for a selected
    /// component: `INSTALLED`, `SELECTABLE`, `FULFILLED` or `IGNORED`.
    pub fn is_acceptable(self) -> bool {
        self >= ConditionResult::Installed
    }
}

/// The domain of an expression, determined by the first character of its
/// attribute keys (`RteConditionExpression::ConstructID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Board,
    Device,
    Toolchain,
    Host,
    ComponentDependency,
    ConditionRef,
}

impl Domain {
    fn from_key(key: &str) -> Option<Domain> {
        match key.chars().next()? {
            'B' => Some(Domain::Board),
            'D' | 'P' => Some(Domain::Device),
            'T' => Some(Domain::Toolchain),
            'H' => Some(Domain::Host),
            'C' => Some(Domain::ComponentDependency),
            'c' => Some(Domain::ConditionRef),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Accept,
    Require,
    Deny,
}

/// The typed payload attached to `<accept>`/`<require>`/`<deny>` items.
/// `domain` and `condition_ref` are derived once during `construct()`.
#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub domain: Option<Domain>,
    pub condition_ref: Option<String>,
}

impl Expression {
    pub(crate) fn new_for_tag(tag: &str) -> Self {
        let kind = match tag {
            "accept" => ExpressionKind::Accept,
            "deny" => ExpressionKind::Deny,
            _ => ExpressionKind::Require,
        };
        Expression {
            kind,
            domain: None,
            condition_ref: None,
        }
    }
}

/// Derives `domain`/`condition_ref` for an expression item and records a
/// structural error when its attribute keys mix domains.
pub(crate) fn construct_expression(store: &mut ItemStore, handle: ItemHandle) {
    let attrs: Vec<String> = store
        .nodes
        .get(handle.0 as usize)
        .map(|n| n.attributes.keys().cloned().collect())
        .unwrap_or_default();

    let condition_ref = store.get_attribute(handle, "condition").map(str::to_string);
    let mut domains: HashSet<Domain> = HashSet::new();
    for key in &attrs {
        if key == "condition" {
            continue;
        }
        if let Some(d) = Domain::from_key(key) {
            domains.insert(d);
        }
    }

    let domain = if condition_ref.is_some() {
        Some(Domain::ConditionRef)
    } else if domains.len() == 1 {
        domains.into_iter().next()
    } else {
        None
    };

    if let crate::item::ItemPayload::Expression(expr) = store.payload_mut(handle) {
        expr.domain = domain;
        expr.condition_ref = condition_ref;
    }
}

pub(crate) fn validate_expression(store: &ItemStore, handle: ItemHandle) -> Vec<String> {
    let mut errors = Vec::new();
    let is_cond_ref = matches!(
        store.payload(handle),
        crate::item::ItemPayload::Expression(Expression { condition_ref: Some(_), .. })
    );
    if !is_cond_ref {
        let domain_ok = matches!(
            store.payload(handle),
            crate::item::ItemPayload::Expression(Expression { domain: Some(_), .. })
        );
        if !domain_ok {
            errors.push("expression attributes mix domains or are empty".to_string());
        }
        if let crate::item::ItemPayload::Expression(Expression {
            domain: Some(Domain::ComponentDependency),
            ..
        }) = store.payload(handle)
        {
            let has_class = store.get_attribute(handle, "Cclass").is_some();
            let has_group = store.get_attribute(handle, "Cgroup").is_some();
            if !has_class || !has_group {
                errors.push("component-dependency expression requires Cclass and Cgroup".to_string());
            }
        }
    }
    errors
}

/// The two evaluation contexts: filter context (pack loading) treats
/// component-dependency expressions as `IGNORED`; dependency context
/// (resolving selected components) delegates them to a solver and
/// short-circuits on the filter-context outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Filter,
    Dependency,
}

/// Anything that can resolve a component-dependency expression to a result,
/// implemented by the dependency solver (`crate::resolver`). The condition
/// engine is generic over this so it never depends on the resolver's
/// concrete aggregate types.
pub trait DependencyEvaluator {
    fn evaluate_component_dependency(
        &mut self,
        store: &ItemStore,
        expr: ItemHandle,
        target_attrs: &HashMap<String, String>,
    ) -> ConditionResult;
}

/// A no-op evaluator used by the filter context: component-dependency
/// expressions are always `IGNORED` while filtering packs.
pub struct NoDependencies;

impl DependencyEvaluator for NoDependencies {
    fn evaluate_component_dependency(
        &mut self,
        _store: &ItemStore,
        _expr: ItemHandle,
        _target_attrs: &HashMap<String, String>,
    ) -> ConditionResult {
        ConditionResult::Ignored
    }
}

/// Evaluates conditions against a fixed target attribute set (device +
/// toolchain + board attributes), with per-(condition, context) caching and
/// recursion protection, mirroring `RteConditionContext`.
pub struct ConditionContext<'a, E: DependencyEvaluator> {
    pub kind: ContextKind,
    pub target_attrs: HashMap<String, String>,
    pub vendor_table: &'a CanonicalVendorTable,
    /// Pack-wide `condition id -> item` lookup, used to resolve `'c'`
    /// domain (condition-reference) expressions regardless of tree
    /// position — conditions are referenced by id, not by nesting.
    condition_lookup: &'a HashMap<String, ItemHandle>,
    cache: HashMap<ItemHandle, ConditionResult>,
    evaluating: HashSet<ItemHandle>,
    evaluator: E,
    /// Filter-context results for the same conditions, consulted by a
    /// dependency context to implement the FAILED→IGNORED short-circuit.
    filter_results: Option<&'a HashMap<ItemHandle, ConditionResult>>,
}

impl<'a, E: DependencyEvaluator> ConditionContext<'a, E> {
    pub fn new_filter(
        target_attrs: HashMap<String, String>,
        vendor_table: &'a CanonicalVendorTable,
        condition_lookup: &'a HashMap<String, ItemHandle>,
        evaluator: E,
    ) -> Self {
        Self {
            kind: ContextKind::Filter,
            target_attrs,
            vendor_table,
            condition_lookup,
            cache: HashMap::new(),
            evaluating: HashSet::new(),
            evaluator,
            filter_results: None,
        }
    }

    pub fn new_dependency(
        target_attrs: HashMap<String, String>,
        vendor_table: &'a CanonicalVendorTable,
        condition_lookup: &'a HashMap<String, ItemHandle>,
        evaluator: E,
        filter_results: &'a HashMap<ItemHandle, ConditionResult>,
    ) -> Self {
        Self {
            kind: ContextKind::Dependency,
            target_attrs,
            vendor_table,
            condition_lookup,
            cache: HashMap::new(),
            evaluating: HashSet::new(),
            evaluator,
            filter_results: Some(filter_results),
        }
    }

    pub fn cached_results(&self) -> &HashMap<ItemHandle, ConditionResult> {
        &self.cache
    }

    /// `evaluate(cond, ctx)` — the public entry point. Returns the cached
    /// value when present.
    pub fn evaluate(&mut self, store: &mut ItemStore, condition: ItemHandle) -> ConditionResult {
        if let Some(r) = self.cache.get(&condition) {
            return *r;
        }

        if self.kind == ContextKind::Dependency {
            if let Some(filter_results) = self.filter_results {
                match filter_results.get(&condition) {
                    Some(ConditionResult::Failed) => {
                        self.cache.insert(condition, ConditionResult::Ignored);
                        return ConditionResult::Ignored;
                    }
                    Some(ConditionResult::RError) => {
                        self.cache.insert(condition, ConditionResult::RError);
                        return ConditionResult::RError;
                    }
                    _ => {}
                }
            }
        }

        if !self.evaluating.insert(condition) {
            store.push_error(condition, "direct or indirect recursion detected".to_string());
            self.cache.insert(condition, ConditionResult::RError);
            return ConditionResult::RError;
        }

        let result = self.evaluate_condition_children(store, condition);

        self.evaluating.remove(&condition);
        self.cache.insert(condition, result);
        result
    }

    fn evaluate_condition_children(&mut self, store: &mut ItemStore, condition: ItemHandle) -> ConditionResult {
        let children: Vec<ItemHandle> = store.children(condition).to_vec();
        if children.is_empty() {
            return ConditionResult::Ignored;
        }

        let mut require_deny_min: Option<ConditionResult> = None;
        let mut accept_max: Option<ConditionResult> = None;
        let mut saw_error = false;

        for child in children {
            let kind = match store.payload(child) {
                crate::item::ItemPayload::Expression(e) => e.kind,
                _ => continue,
            };
            let result = self.evaluate_expression(store, child);
            if result == ConditionResult::RError {
                saw_error = true;
            }
            match kind {
                ExpressionKind::Accept => {
                    accept_max = Some(match accept_max {
                        Some(m) => m.max(result),
                        None => result,
                    });
                }
                ExpressionKind::Require | ExpressionKind::Deny => {
                    require_deny_min = Some(match require_deny_min {
                        Some(m) => m.min(result),
                        None => result,
                    });
                }
            }
        }

        if saw_error {
            return ConditionResult::RError;
        }

        match (accept_max, require_deny_min) {
            (Some(accept), Some(require)) => {
                if accept < require {
                    accept
                } else {
                    require
                }
            }
            (Some(accept), None) => accept,
            (None, Some(require)) => require,
            (None, None) => ConditionResult::Ignored,
        }
    }

    /// Evaluates one `<accept>`/`<require>`/`<deny>` expression.
    pub fn evaluate_expression(&mut self, store: &mut ItemStore, expr: ItemHandle) -> ConditionResult {
        let (kind, domain, condition_ref) = match store.payload(expr) {
            crate::item::ItemPayload::Expression(e) => (e.kind, e.domain, e.condition_ref.clone()),
            _ => return ConditionResult::RError,
        };

        let base = if let Some(condition_ref) = condition_ref {
            self.evaluate_condition_ref(store, &condition_ref)
        } else {
            match domain {
                Some(Domain::ComponentDependency) => {
                    if self.kind == ContextKind::Filter {
                        return ConditionResult::Ignored;
                    }
                    let attrs = self.target_attrs.clone();
                    self.evaluator.evaluate_component_dependency(store, expr, &attrs)
                }
                Some(_) => self.evaluate_attribute_domain(store, expr),
                None => ConditionResult::RError,
            }
        };

        if kind == ExpressionKind::Deny {
            negate(base, self.kind)
        } else {
            base
        }
    }

    fn evaluate_condition_ref(&mut self, store: &mut ItemStore, condition_id: &str) -> ConditionResult {
        match self.condition_lookup.get(condition_id).copied() {
            Some(target) => self.evaluate(store, target),
            None => ConditionResult::RError,
        }
    }

    fn evaluate_attribute_domain(&self, store: &ItemStore, expr: ItemHandle) -> ConditionResult {
        let is_deny = matches!(
            store.payload(expr),
            crate::item::ItemPayload::Expression(Expression { kind: ExpressionKind::Deny, .. })
        );

        let node_attrs: Vec<(String, String)> = store
            .nodes
            .get(expr.0 as usize)
            .map(|n| {
                n.attributes
                    .iter()
                    .filter(|(k, _)| k.as_str() != "condition")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for (key, value) in &node_attrs {
            let Some(actual) = self.target_attrs.get(key) else {
                return if is_deny { ConditionResult::Fulfilled } else { ConditionResult::Failed };
            };

            let matched = if key == "Dvendor" || key == "Bvendor" {
                self.vendor_table.matches(value, actual) == VendorMatch::Match
            } else if key == "Dcdecp" {
                dcdecp_match(value, actual)
            } else {
                wildcard_match(value, actual)
            };

            if !matched {
                return ConditionResult::Failed;
            }
        }

        ConditionResult::Fulfilled
    }
}

/// The DENY negation table: flips `FULFILLED` to `INCOMPATIBLE` (dependency
/// context) or `FAILED` (filter context), and `FAILED`/`INCOMPATIBLE` back
/// to `FULFILLED`. Other results pass through unchanged — a DENY can only
/// ever turn a match into a non-match or vice versa, it does not invent new
/// severities.
fn negate(result: ConditionResult, ctx: ContextKind) -> ConditionResult {
    match (result, ctx) {
        (ConditionResult::Fulfilled, ContextKind::Dependency) => ConditionResult::Incompatible,
        (ConditionResult::Fulfilled, ContextKind::Filter) => ConditionResult::Failed,
        (ConditionResult::Failed, _) => ConditionResult::Fulfilled,
        (ConditionResult::Incompatible, _) => ConditionResult::Fulfilled,
        (other, _) => other,
    }
}

/// Renders a result + item context into the display text a consumer would
/// show the user, mirroring `RteDependencyResult::GetOutputMessage`.
pub fn dependency_message(component_id: &str, result: ConditionResult) -> String {
    match result {
        ConditionResult::Missing => format!("missing dependency for component '{component_id}'"),
        ConditionResult::MissingApi => format!("missing API required by component '{component_id}'"),
        ConditionResult::MissingApiVersion => {
            format!("required API version not available for component '{component_id}'")
        }
        ConditionResult::Conflict => format!("conflict: '{component_id}' conflicts with another selected component"),
        ConditionResult::Incompatible | ConditionResult::IncompatibleVersion | ConditionResult::IncompatibleVariant => {
            format!("incompatible dependency for component '{component_id}'")
        }
        ConditionResult::Selectable => format!("dependency for '{component_id}' can be resolved automatically"),
        ConditionResult::RError => format!("recursive condition detected while evaluating '{component_id}'"),
        _ => format!("component '{component_id}' dependencies satisfied"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn build_single_expr(store: &mut ItemStore, kind: &str, attrs: &[(&str, &str)]) -> ItemHandle {
        let cond = store.create_child(None, "condition");
        store.add_attribute(cond, "id", "test", true);
        let expr = store.create_child(Some(cond), kind);
        for (k, v) in attrs {
            store.add_attribute(expr, k, v, true);
        }
        construct_expression(store, expr);
        cond
    }

    #[test]
    fn lattice_ordering_is_as_specified() {
        assert!(ConditionResult::RError < ConditionResult::Failed);
        assert!(ConditionResult::Failed < ConditionResult::Missing);
        assert!(ConditionResult::Conflict < ConditionResult::Installed);
        assert!(ConditionResult::Selectable < ConditionResult::Fulfilled);
        assert!(ConditionResult::Fulfilled < ConditionResult::Ignored);
    }

    #[test]
    fn require_fulfilled_matches_device_wildcard() {
        let mut store = ItemStore::new();
        let cond = build_single_expr(&mut store, "require", &[("Dname", "ARMCM*")]);
        let vendor_table = CanonicalVendorTable::new();
        let lookup = HashMap::new();
        let mut ctx = ConditionContext::new_filter(attrs(&[("Dname", "ARMCM3")]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond), ConditionResult::Fulfilled);
    }

    #[test]
    fn require_failed_on_missing_attribute() {
        let mut store = ItemStore::new();
        let cond = build_single_expr(&mut store, "require", &[("Dname", "ARMCM3")]);
        let vendor_table = CanonicalVendorTable::new();
        let lookup = HashMap::new();
        let mut ctx = ConditionContext::new_filter(attrs(&[]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond), ConditionResult::Failed);
    }

    #[test]
    fn deny_with_no_match_is_fulfilled() {
        let mut store = ItemStore::new();
        let cond = build_single_expr(&mut store, "deny", &[("Dname", "ARMCM3")]);
        let vendor_table = CanonicalVendorTable::new();
        let lookup = HashMap::new();
        let mut ctx = ConditionContext::new_filter(attrs(&[("Dname", "ARMCM4")]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond), ConditionResult::Fulfilled);
    }

    #[test]
    fn accept_overrides_failing_require_per_max_vs_min_rule() {
        let mut store = ItemStore::new();
        let cond = store.create_child(None, "condition");
        store.add_attribute(cond, "id", "test", true);

        let req = store.create_child(Some(cond), "require");
        store.add_attribute(req, "Tcompiler", "GCC", true);
        construct_expression(&mut store, req);

        let acc = store.create_child(Some(cond), "accept");
        store.add_attribute(acc, "Dname", "ARMCM3", true);
        construct_expression(&mut store, acc);

        let vendor_table = CanonicalVendorTable::new();
        let lookup = HashMap::new();
        let mut ctx = ConditionContext::new_filter(attrs(&[("Dname", "ARMCM3")]), &vendor_table, &lookup, NoDependencies);
        // require.Tcompiler is missing -> FAILED; accept.Dname matches -> FULFILLED.
        // accept < require is false (FULFILLED > FAILED), so the require
        // result wins per the max-vs-min rule.
        assert_eq!(ctx.evaluate(&mut store, cond), ConditionResult::Failed);
    }

    #[test]
    fn two_accepts_one_failed_one_fulfilled_yields_fulfilled() {
        let mut store = ItemStore::new();
        let cond = store.create_child(None, "condition");
        store.add_attribute(cond, "id", "test", true);

        let acc1 = store.create_child(Some(cond), "accept");
        store.add_attribute(acc1, "Dname", "ARMCM3", true);
        construct_expression(&mut store, acc1);

        let acc2 = store.create_child(Some(cond), "accept");
        store.add_attribute(acc2, "Dname", "ARMCM4", true);
        construct_expression(&mut store, acc2);

        let vendor_table = CanonicalVendorTable::new();
        let lookup = HashMap::new();
        let mut ctx = ConditionContext::new_filter(attrs(&[("Dname", "ARMCM3")]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond), ConditionResult::Fulfilled);
    }

    #[test]
    fn self_referential_condition_is_rerror() {
        let mut store = ItemStore::new();
        let cond_a = store.create_child(None, "condition");
        store.add_attribute(cond_a, "id", "A", true);
        let expr_a = store.create_child(Some(cond_a), "require");
        store.add_attribute(expr_a, "condition", "A", true);
        construct_expression(&mut store, expr_a);

        let vendor_table = CanonicalVendorTable::new();
        let mut lookup = HashMap::new();
        lookup.insert("A".to_string(), cond_a);
        let mut ctx = ConditionContext::new_filter(attrs(&[]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond_a), ConditionResult::RError);
    }

    #[test]
    fn mutual_recursion_between_two_conditions_is_rerror() {
        let mut store = ItemStore::new();
        let cond_a = store.create_child(None, "condition");
        store.add_attribute(cond_a, "id", "A", true);
        let expr_a = store.create_child(Some(cond_a), "require");
        store.add_attribute(expr_a, "condition", "B", true);
        construct_expression(&mut store, expr_a);

        let cond_b = store.create_child(None, "condition");
        store.add_attribute(cond_b, "id", "B", true);
        let expr_b = store.create_child(Some(cond_b), "require");
        store.add_attribute(expr_b, "condition", "A", true);
        construct_expression(&mut store, expr_b);

        let vendor_table = CanonicalVendorTable::new();
        let mut lookup = HashMap::new();
        lookup.insert("A".to_string(), cond_a);
        lookup.insert("B".to_string(), cond_b);
        let mut ctx = ConditionContext::new_filter(attrs(&[]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond_a), ConditionResult::RError);
    }

    #[test]
    fn missing_condition_ref_is_rerror() {
        let mut store = ItemStore::new();
        let cond = store.create_child(None, "condition");
        store.add_attribute(cond, "id", "A", true);
        let expr = store.create_child(Some(cond), "require");
        store.add_attribute(expr, "condition", "NoSuchCondition", true);
        construct_expression(&mut store, expr);

        let vendor_table = CanonicalVendorTable::new();
        let lookup = HashMap::new();
        let mut ctx = ConditionContext::new_filter(attrs(&[]), &vendor_table, &lookup, NoDependencies);
        assert_eq!(ctx.evaluate(&mut store, cond), ConditionResult::RError);
    }
}
