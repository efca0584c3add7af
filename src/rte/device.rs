//! Device hierarchy (L1): vendor/family/subfamily/device/variant/processor
//! nodes, their property-inheritance rule (§3.4, §4.3), and the
//! cross-pack device unification aggregate (§9 supplement 3, grounded on
//! `RteDevice.h`/`RteDevice.cpp`'s `RteDeviceItem`, `RteDeviceProperty`,
//! `RteDeviceItemAggregate`, `RteDeviceVendor`, `RteFlashInfoBlock`).

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::item::{ItemHandle, ItemPayload, ItemStore};

/// Device-hierarchy node kinds, strictly ordered `VENDOR_LIST → VENDOR →
/// FAMILY → SUBFAMILY → DEVICE → VARIANT → PROCESSOR` (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceNodeKind {
    VendorList,
    Vendor,
    Family,
    Subfamily,
    Device,
    Variant,
    Processor,
}

impl DeviceNodeKind {
    pub fn for_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "devices" => DeviceNodeKind::VendorList,
            "family" => DeviceNodeKind::Family,
            "subfamily" => DeviceNodeKind::Subfamily,
            "device" => DeviceNodeKind::Device,
            "variant" => DeviceNodeKind::Variant,
            _ => return None,
        })
    }

    /// The `id` attribute a device-hierarchy node keys its name by.
    pub fn name_attribute(self) -> &'static str {
        match self {
            DeviceNodeKind::Family | DeviceNodeKind::Subfamily => "Dfamily",
            DeviceNodeKind::Device => "Dname",
            DeviceNodeKind::Variant => "Dvariant",
            DeviceNodeKind::Processor => "Pname",
            DeviceNodeKind::Vendor | DeviceNodeKind::VendorList => "Dvendor",
        }
    }
}

/// Device-property tags. `collect_effective_content` marks properties whose
/// subtrees are merged element-wise on a matching `id` rather than simply
/// appended (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevicePropertyKind {
    Memory,
    Algorithm,
    Processor,
    Debug,
    DebugConfig,
    DebugPort,
    Sequence,
    FlashInfo,
    Feature,
    Book,
    Compile,
    Environment,
}

impl DevicePropertyKind {
    pub fn for_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "memory" => DevicePropertyKind::Memory,
            "algorithm" => DevicePropertyKind::Algorithm,
            "processor" => DevicePropertyKind::Processor,
            "debug" => DevicePropertyKind::Debug,
            "debugconfig" => DevicePropertyKind::DebugConfig,
            "debugport" => DevicePropertyKind::DebugPort,
            "sequence" => DevicePropertyKind::Sequence,
            "flashinfo" => DevicePropertyKind::FlashInfo,
            "feature" => DevicePropertyKind::Feature,
            "book" => DevicePropertyKind::Book,
            "compile" => DevicePropertyKind::Compile,
            "environment" => DevicePropertyKind::Environment,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            DevicePropertyKind::Memory => "memory",
            DevicePropertyKind::Algorithm => "algorithm",
            DevicePropertyKind::Processor => "processor",
            DevicePropertyKind::Debug => "debug",
            DevicePropertyKind::DebugConfig => "debugconfig",
            DevicePropertyKind::DebugPort => "debugport",
            DevicePropertyKind::Sequence => "sequence",
            DevicePropertyKind::FlashInfo => "flashinfo",
            DevicePropertyKind::Feature => "feature",
            DevicePropertyKind::Book => "book",
            DevicePropertyKind::Compile => "compile",
            DevicePropertyKind::Environment => "environment",
        }
    }

    /// Properties whose children are merged by `id` on collision rather
    /// than kept as separate list entries (§3.4: "merged element-wise when
    /// the property declares `collect_effective_content`").
    pub fn collects_effective_content(self) -> bool {
        matches!(self, DevicePropertyKind::FlashInfo | DevicePropertyKind::DebugConfig)
    }

    /// Properties that are "unique" per §4.3's merge rule: a second
    /// property of this kind with the same `id` has its attributes and
    /// child content merged into the first rather than being appended as
    /// a sibling entry.
    pub fn is_unique(self) -> bool {
        matches!(
            self,
            DevicePropertyKind::Debug | DevicePropertyKind::DebugConfig | DevicePropertyKind::FlashInfo
        )
    }
}

/// `RteFlashInfoBlock::CalculateCachedValuesForBlock` (§4.3, §9 supplement
/// 4): cached recurrence over `<block>`/`<gap>` children of a `<flashinfo>`
/// element, computed once at `construct()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashInfoBlock {
    pub start: u64,
    pub size: u64,
    pub count: u64,
    pub total_size: u64,
}

/// Walks the `<block>`/`<gap>` children of a `<flashinfo>` item and caches
/// `start`/`total_size` per the recurrence `start = prev.start +
/// prev.total_size` (first child starts at the parent's declared `start`),
/// `total_size = size * count`.
pub(crate) fn construct_flash_info(store: &mut ItemStore, handle: ItemHandle) {
    let base_start: u64 = store
        .get_attribute(handle, "start")
        .and_then(|s| parse_u64(s))
        .unwrap_or(0);

    let children: Vec<ItemHandle> = store.children(handle).to_vec();
    let mut prev: Option<FlashInfoBlock> = None;
    for child in children {
        if !matches!(store.tag(child), "block" | "gap") {
            continue;
        }
        let size = store.get_attribute(child, "size").and_then(parse_u64).unwrap_or(0);
        let count = store.get_attribute(child, "count").and_then(parse_u64).unwrap_or(1).max(1);
        let start = match prev {
            Some(p) => p.start + p.total_size,
            None => base_start,
        };
        let block = FlashInfoBlock {
            start,
            size,
            count,
            total_size: size * count,
        };
        store.add_attribute(child, "__start", &block.start.to_string(), true);
        store.add_attribute(child, "__total_size", &block.total_size.to_string(), true);
        prev = Some(block);
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// No per-tag derived state beyond what's already on the generic item for
/// most device-hierarchy nodes and properties; construction is a no-op
/// hook kept for symmetry with other tag-dispatched constructors and as
/// the extension point named in the design notes.
pub(crate) fn construct_device_item(_store: &mut ItemStore, _handle: ItemHandle) {}

/// One property entry in an effective-property map: the originating item
/// plus its (already-merged, where applicable) attribute map.
#[derive(Debug, Clone)]
pub struct EffectiveProperty {
    pub item: ItemHandle,
    pub tag: String,
    pub attributes: IndexMap<String, String>,
}

/// `effective_properties(pName)` (§3.4): for a device-hierarchy node,
/// returns a tag-keyed map of property lists built bottom-up from `self`
/// through the ancestor chain up to (and including) the owning `FAMILY`.
///
/// Traversal order matters: the algorithm visits `self` first, then each
/// ancestor in turn, so a child's property of a given `id` is seen before
/// its ancestor's and therefore wins (`if P.id not yet present ... append`
/// — first-seen wins, and self is seen first).
pub fn effective_properties(
    store: &ItemStore,
    node: ItemHandle,
    processor_name: Option<&str>,
) -> IndexMap<String, Vec<EffectiveProperty>> {
    let mut out: IndexMap<String, Vec<EffectiveProperty>> = IndexMap::new();
    let mut seen_ids: HashMap<String, HashMap<String, usize>> = HashMap::new();

    for n in ancestor_chain(store, node) {
        for group in store.children(n).to_vec() {
            let Some(kind) = DevicePropertyKind::for_tag(store.tag(group)) else {
                continue;
            };
            let pname = store.get_attribute(group, "Pname").unwrap_or("");
            let matches_processor =
                pname.is_empty() || processor_name.is_none() || processor_name == Some(pname);
            if !matches_processor {
                continue;
            }
            let tag = kind.tag().to_string();
            let prop_id = store
                .get_attribute(group, "id")
                .or_else(|| store.get_attribute(group, "name"))
                .unwrap_or("")
                .to_string();

            let bucket = out.entry(tag.clone()).or_default();
            let id_index = seen_ids.entry(tag.clone()).or_default();

            if !prop_id.is_empty() {
                if let Some(&existing_idx) = id_index.get(&prop_id) {
                    if kind.is_unique() {
                        merge_property(store, bucket, existing_idx, group);
                    } else {
                        bucket.push(to_effective(store, group, &tag));
                    }
                    continue;
                }
                id_index.insert(prop_id, bucket.len());
            }
            bucket.push(to_effective(store, group, &tag));
        }
    }

    out
}

/// `self` first, then each ancestor up to (and including) the owning
/// `FAMILY` node — the bottom-up walk order §4.3 specifies.
fn ancestor_chain(store: &ItemStore, node: ItemHandle) -> Vec<ItemHandle> {
    let mut chain = vec![node];
    let mut current = node;
    while !matches!(store.payload(current), ItemPayload::DeviceNode(DeviceNodeKind::Family)) {
        match store.parent(current) {
            Some(p) => {
                chain.push(p);
                current = p;
            }
            None => break,
        }
    }
    chain
}

fn to_effective(store: &ItemStore, item: ItemHandle, tag: &str) -> EffectiveProperty {
    EffectiveProperty {
        item,
        tag: tag.to_string(),
        attributes: attribute_snapshot(store, item),
    }
}

fn attribute_snapshot(store: &ItemStore, item: ItemHandle) -> IndexMap<String, String> {
    store
        .nodes
        .get(item.0 as usize)
        .map(|n| n.attributes.clone())
        .unwrap_or_default()
}

/// Merges a newer occurrence of a "unique" property (same `id`) into the
/// one already recorded at `existing_idx`: attributes from the more
/// specific (child-chain) occurrence are already present (it was inserted
/// first, since traversal is self-first); here we fold in any attribute
/// keys the existing entry lacks, so ancestor detail still surfaces.
fn merge_property(store: &ItemStore, bucket: &mut [EffectiveProperty], existing_idx: usize, newer: ItemHandle) {
    let newer_attrs = attribute_snapshot(store, newer);
    let existing = &mut bucket[existing_idx];
    for (k, v) in newer_attrs {
        existing.attributes.entry(k).or_insert(v);
    }
}

/// `effective_filter_attributes(pName)` (§3.4): the merged attribute
/// dictionary of the device ancestor chain plus the effective `<processor>`
/// property for `pName` — the input domain for condition evaluation.
pub fn effective_filter_attributes(
    store: &ItemStore,
    node: ItemHandle,
    processor_name: Option<&str>,
) -> IndexMap<String, String> {
    let mut attrs = IndexMap::new();
    // Root-most ancestor first so nearer nodes override, per §3.4 "child
    // overrides parent for the same attribute key".
    for n in ancestor_chain(store, node).into_iter().rev() {
        for (k, v) in attribute_snapshot(store, n) {
            attrs.insert(k, v);
        }
    }

    let props = effective_properties(store, node, processor_name);
    if let Some(processors) = props.get("processor") {
        if let Some(p) = processors.iter().find(|p| {
            processor_name.is_none_or(|n| p.attributes.get("Pname").map(String::as_str) == Some(n))
        }) {
            for (k, v) in &p.attributes {
                attrs.insert(k.clone(), v.clone());
            }
        }
    }

    attrs
}

/// Cross-pack device unification (§9 supplement 3, grounded on
/// `RteDeviceItemAggregate`/`RteDeviceVendor`): a tree of named aggregate
/// nodes, each owning the concrete device-hierarchy items (one per
/// contributing pack) that share its name at this level, plus child
/// aggregates for the next hierarchy level down.
#[derive(Debug, Clone, Default)]
pub struct DeviceAggregate {
    pub name: String,
    pub kind: Option<DeviceNodeKind>,
    /// Concrete items contributed by different packs, in pack-priority
    /// order (nearer the front = higher priority pack, per the caller's
    /// pack ordering).
    pub items: Vec<ItemHandle>,
    pub children: IndexMap<String, DeviceAggregate>,
}

impl DeviceAggregate {
    pub fn root() -> Self {
        Self {
            name: String::new(),
            kind: None,
            items: Vec::new(),
            children: IndexMap::new(),
        }
    }

    /// Inserts one concrete device-hierarchy node (and recursively its
    /// device-hierarchy descendants) into the aggregate tree, keyed by
    /// name at each level.
    pub fn insert(&mut self, store: &ItemStore, item: ItemHandle) {
        let Some(kind) = (match store.payload(item) {
            ItemPayload::DeviceNode(k) => Some(*k),
            _ => None,
        }) else {
            return;
        };
        let name = store
            .get_attribute(item, kind.name_attribute())
            .unwrap_or("")
            .to_string();
        let entry = self.children.entry(name.clone()).or_insert_with(|| DeviceAggregate {
            name,
            kind: Some(kind),
            items: Vec::new(),
            children: IndexMap::new(),
        });
        entry.items.push(item);
        for child in store.children(item).to_vec() {
            if matches!(
                store.payload(child),
                ItemPayload::DeviceNode(
                    DeviceNodeKind::Family
                        | DeviceNodeKind::Subfamily
                        | DeviceNodeKind::Device
                        | DeviceNodeKind::Variant
                )
            ) {
                entry.insert(store, child);
            }
        }
    }

    /// Finds an aggregate by dotted path (`Family.Subfamily.Device`), the
    /// lookup shape `GetDevices`/wildcard search builds on.
    pub fn find(&self, path: &[&str]) -> Option<&DeviceAggregate> {
        let mut node = self;
        for segment in path {
            node = node.children.get(*segment)?;
        }
        Some(node)
    }

    /// Highest-priority concrete item for this aggregate (first inserted —
    /// callers insert in pack-priority order).
    pub fn primary(&self) -> Option<ItemHandle> {
        self.items.first().copied()
    }
}
