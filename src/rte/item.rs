//! The item tree (L0): a generic, arena-owned tree of attribute-bearing
//! nodes that every higher layer builds on. Each [`Package`](crate::package::Package)
//! owns exactly one [`ItemStore`]; items within it are addressed by
//! [`ItemHandle`], never by direct reference, per the "pointer graphs with
//! cross-references" design note — items may reference siblings anywhere in
//! the arena without borrow-checker gymnastics.

use indexmap::IndexMap;
use std::cell::OnceCell;

use crate::board::BoardData;
use crate::component::{ApiData, BundleData, ComponentData};
use crate::condition::Expression;
use crate::device::{DeviceNodeKind, DevicePropertyKind};
use crate::package::ReleaseData;

/// A tagged reference into an [`ItemStore`]. Cheap to copy; carries no
/// lifetime, so it may be stored inside other items to model
/// cross-references (condition refs, component→API, board→device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(pub(crate) u32);

/// The external XML collaborator's shape (§6.1): a tagged tree with an
/// ordered attribute map and text payload. The core never parses XML
/// itself; this is the contract it receives and, for effective-device
/// dumps, produces.
#[derive(Debug, Clone, Default)]
pub struct TreeElement {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub text: String,
    pub children: Vec<TreeElement>,
}

impl TreeElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: IndexMap::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: TreeElement) -> Self {
        self.children.push(child);
        self
    }
}

/// The tagged-variant payload attached to every item (design note: "deep
/// inheritance" is replaced by a sum type dispatched on `tag` at
/// construction time, instead of virtual `create_child`/accessor overrides).
#[derive(Debug, Clone)]
pub enum ItemPayload {
    /// A plain container item (`<components>`, `<conditions>`, …) or any
    /// tag the model does not special-case.
    Generic,
    Condition,
    Expression(Expression),
    Component(ComponentData),
    Api(ApiData),
    Bundle(BundleData),
    DeviceNode(DeviceNodeKind),
    DeviceProperty(DevicePropertyKind),
    Board(BoardData),
    Release(ReleaseData),
}

#[derive(Debug, Clone)]
pub(crate) struct ItemNode {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub text: String,
    pub parent: Option<ItemHandle>,
    pub children: Vec<ItemHandle>,
    pub id: OnceCell<String>,
    pub valid: bool,
    pub errors: Vec<String>,
    pub payload: ItemPayload,
}

impl ItemNode {
    fn new(tag: impl Into<String>, payload: ItemPayload) -> Self {
        Self {
            tag: tag.into(),
            attributes: IndexMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            id: OnceCell::new(),
            valid: true,
            errors: Vec::new(),
            payload,
        }
    }
}

/// An owning arena of items, scoped to one pack. Mirrors `RteItem`'s
/// parent/children tree, but with handle indirection instead of raw
/// pointers so the tree can be built, walked and mutated without a borrow
/// conflict between a node and its parent.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    pub(crate) nodes: Vec<ItemNode>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// `create_child(tag)` — dispatches on the element tag to build an item
    /// whose payload reflects its domain kind. Attaches it to `parent` if
    /// given; always returns the new handle.
    pub fn create_child(&mut self, parent: Option<ItemHandle>, tag: &str) -> ItemHandle {
        let payload = payload_for_tag(tag);
        let node = ItemNode::new(tag, payload);
        let handle = ItemHandle(self.nodes.len() as u32);
        self.nodes.push(node);
        if let Some(p) = parent {
            self.nodes[p.0 as usize].children.push(handle);
            self.nodes[handle.0 as usize].parent = Some(p);
        }
        handle
    }

    pub fn add_attribute(&mut self, handle: ItemHandle, name: &str, value: &str, overwrite: bool) {
        let node = &mut self.nodes[handle.0 as usize];
        if overwrite || !node.attributes.contains_key(name) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
        node.id = OnceCell::new();
    }

    pub fn get_attribute<'a>(&'a self, handle: ItemHandle, name: &str) -> Option<&'a str> {
        self.nodes[handle.0 as usize]
            .attributes
            .get(name)
            .map(String::as_str)
    }

    pub fn attribute_or<'a>(&'a self, handle: ItemHandle, name: &str, default: &'a str) -> &'a str {
        self.get_attribute(handle, name).unwrap_or(default)
    }

    pub fn tag(&self, handle: ItemHandle) -> &str {
        &self.nodes[handle.0 as usize].tag
    }

    pub fn text(&self, handle: ItemHandle) -> &str {
        &self.nodes[handle.0 as usize].text
    }

    pub fn set_text(&mut self, handle: ItemHandle, text: impl Into<String>) {
        self.nodes[handle.0 as usize].text = text.into();
    }

    pub fn parent(&self, handle: ItemHandle) -> Option<ItemHandle> {
        self.nodes[handle.0 as usize].parent
    }

    pub fn children(&self, handle: ItemHandle) -> &[ItemHandle] {
        &self.nodes[handle.0 as usize].children
    }

    pub fn children_with_tag<'a>(
        &'a self,
        handle: ItemHandle,
        tag: &'a str,
    ) -> impl Iterator<Item = ItemHandle> + 'a {
        self.children(handle)
            .iter()
            .copied()
            .filter(move |c| self.tag(*c) == tag)
    }

    pub fn payload(&self, handle: ItemHandle) -> &ItemPayload {
        &self.nodes[handle.0 as usize].payload
    }

    pub fn payload_mut(&mut self, handle: ItemHandle) -> &mut ItemPayload {
        &mut self.nodes[handle.0 as usize].payload
    }

    /// Lazily computes and caches `id` via `compute` the first time it is
    /// requested after a `construct()`/attribute edit invalidated the cache.
    pub fn id_or_compute(&self, handle: ItemHandle, compute: impl FnOnce() -> String) -> &str {
        self.nodes[handle.0 as usize].id.get_or_init(compute)
    }

    pub fn is_valid(&self, handle: ItemHandle) -> bool {
        self.nodes[handle.0 as usize].valid
    }

    pub fn errors(&self, handle: ItemHandle) -> &[String] {
        &self.nodes[handle.0 as usize].errors
    }

    pub fn push_error(&mut self, handle: ItemHandle, error: String) {
        let node = &mut self.nodes[handle.0 as usize];
        node.valid = false;
        node.errors.push(error);
    }

    /// Recursive, bottom-up: builds every item from `tree`, then invokes
    /// domain-specific construction hooks (see `condition::construct`,
    /// `device::construct`, …) child-first so a parent's derived fields can
    /// see its children's finished state. Idempotent: re-running after
    /// subtree edits simply rebuilds attributes and re-derives fields.
    pub fn construct_from(&mut self, parent: Option<ItemHandle>, tree: &TreeElement) -> ItemHandle {
        let handle = self.create_child(parent, &tree.tag);
        for (k, v) in &tree.attributes {
            self.add_attribute(handle, k, v, true);
        }
        self.set_text(handle, tree.text.clone());
        for child_tree in &tree.children {
            self.construct_from(Some(handle), child_tree);
        }
        crate::construct_item(self, handle);
        handle
    }

    /// `validate()` — recursive; collects error strings into each item,
    /// propagating child invalidity to the parent lazily (only at this
    /// call, not eagerly on every edit).
    pub fn validate(&mut self, handle: ItemHandle) -> bool {
        let children: Vec<ItemHandle> = self.children(handle).to_vec();
        let mut all_valid = true;
        for child in children {
            if !self.validate(child) {
                all_valid = false;
            }
        }
        let own_errors = crate::validate_item(self, handle);
        for e in own_errors {
            self.push_error(handle, e);
        }
        if !self.nodes[handle.0 as usize].valid {
            all_valid = false;
        }
        if !all_valid {
            self.nodes[handle.0 as usize].valid = false;
        }
        self.nodes[handle.0 as usize].valid
    }

    /// Inverse of `construct_from`: serialises a subtree back to a
    /// `TreeElement`, used by generators that must hand an effective-device
    /// dump back to the XML collaborator.
    pub fn create_tree_element(&self, handle: ItemHandle) -> TreeElement {
        let node = &self.nodes[handle.0 as usize];
        let mut out = TreeElement::new(node.tag.clone());
        out.attributes = node.attributes.clone();
        out.text = node.text.clone();
        out.children = node.children.iter().map(|c| self.create_tree_element(*c)).collect();
        out
    }
}

fn payload_for_tag(tag: &str) -> ItemPayload {
    match tag {
        "condition" => ItemPayload::Condition,
        "accept" | "require" | "deny" => {
            ItemPayload::Expression(Expression::new_for_tag(tag))
        }
        "component" => ItemPayload::Component(ComponentData::default()),
        "api" => ItemPayload::Api(ApiData::default()),
        "bundle" => ItemPayload::Bundle(BundleData::default()),
        "release" => ItemPayload::Release(ReleaseData::default()),
        "board" => ItemPayload::Board(BoardData::default()),
        _ => {
            if let Some(kind) = DeviceNodeKind::for_tag(tag) {
                ItemPayload::DeviceNode(kind)
            } else if let Some(kind) = DevicePropertyKind::for_tag(tag) {
                ItemPayload::DeviceProperty(kind)
            } else {
                ItemPayload::Generic
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_child_links_parent_and_children() {
        let mut store = ItemStore::new();
        let root = store.create_child(None, "package");
        let child = store.create_child(Some(root), "components");
        assert_eq!(store.parent(child), Some(root));
        assert_eq!(store.children(root), &[child]);
    }

    #[test]
    fn attribute_overwrite_respects_flag() {
        let mut store = ItemStore::new();
        let h = store.create_child(None, "component");
        store.add_attribute(h, "Cclass", "Device", true);
        store.add_attribute(h, "Cclass", "Other", false);
        assert_eq!(store.get_attribute(h, "Cclass"), Some("Device"));
        store.add_attribute(h, "Cclass", "Other", true);
        assert_eq!(store.get_attribute(h, "Cclass"), Some("Other"));
    }

    #[test]
    fn id_is_computed_once_and_cached() {
        let mut store = ItemStore::new();
        let h = store.create_child(None, "component");
        let mut calls = 0;
        {
            let _ = store.id_or_compute(h, || {
                calls += 1;
                "id".to_string()
            });
        }
        let _ = store.id_or_compute(h, || {
            calls += 1;
            "id2".to_string()
        });
        assert_eq!(calls, 1);
    }
}
