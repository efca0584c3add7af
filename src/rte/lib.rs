//! `cmsis-rte` — the CMSIS Run-Time Environment core: the item tree, the
//! condition engine, device-property inheritance, the pack and global
//! models, the target/project layer, the dependency solver and the CPRJ
//! binder.
//!
//! Layering follows an L0-L4 split (item tree, condition engine and
//! device model, pack/global model, target/solver, code generators);
//! each module depends only on those named before it in this list.

pub mod item;

pub mod condition;
pub mod device;

pub mod component;
pub mod board;

pub mod package;
pub mod model;

pub mod target;
pub mod resolver;

pub mod cprj;

pub mod diagnostic;
pub mod config;

pub use config::RteConfig;
pub use diagnostic::{Diagnostic, DiagnosticSink};
pub use item::{ItemHandle, ItemPayload, ItemStore, TreeElement};

use item::ItemPayload;

/// Tag-dispatched construction hook invoked by [`ItemStore::construct_from`]
/// once an item and all of its children have been built. Mirrors the
/// "deep inheritance replaced by tagged-variant dispatch" design note:
/// there is no virtual `RteItem::Construct` override per subclass, just a
/// match on `tag`/payload here.
pub(crate) fn construct_item(store: &mut ItemStore, handle: ItemHandle) {
    match store.tag(handle) {
        "accept" | "require" | "deny" => condition::construct_expression(store, handle),
        "package" => package::construct_package(store, handle),
        "release" => package::construct_release(store, handle),
        "component" | "bundle" => component::construct_component(store, handle),
        "api" => component::construct_api(store, handle),
        "board" => board::construct_board(store, handle),
        "flashinfo" => device::construct_flash_info(store, handle),
        _ => {
            if matches!(
                store.payload(handle),
                ItemPayload::DeviceNode(_) | ItemPayload::DeviceProperty(_)
            ) {
                device::construct_device_item(store, handle);
            }
        }
    }
}

/// Tag-dispatched validation hook; returns this item's *own* errors (not
/// its children's — `ItemStore::validate` already recurses and aggregates
/// those separately).
pub(crate) fn validate_item(store: &ItemStore, handle: ItemHandle) -> Vec<String> {
    match store.tag(handle) {
        "accept" | "require" | "deny" => condition::validate_expression(store, handle),
        "package" => package::validate_package(store, handle),
        "component" => component::validate_component(store, handle),
        _ => Vec::new(),
    }
}
