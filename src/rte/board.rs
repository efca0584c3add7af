//! Board model (§3.5), grounded on `RteBoard.h`/`RteBoard.cpp`.

use crate::item::{ItemHandle, ItemPayload, ItemStore};
use rte_platform::{wildcard_match, CanonicalVendorTable, VendorMatch};

#[derive(Debug, Clone, Default)]
pub struct BoardData {
    pub vendor: String,
    pub name: String,
}

pub(crate) fn construct_board(store: &mut ItemStore, handle: ItemHandle) {
    let vendor = store.get_attribute(handle, "vendor").unwrap_or("").to_string();
    let name = store.get_attribute(handle, "name").unwrap_or("").to_string();
    if let ItemPayload::Board(b) = store.payload_mut(handle) {
        b.vendor = vendor;
        b.name = name;
    }
}

/// A `<mountedDevice>`/`<compatibleDevice>` child's device-matching
/// attributes (`Dname`/`Dvariant`/`Dvendor`).
fn device_matches(store: &ItemStore, device_entry: ItemHandle, vendor_table: &CanonicalVendorTable, target: &ItemStore, target_device: ItemHandle) -> bool {
    let entry_vendor = store.get_attribute(device_entry, "Dvendor").unwrap_or("");
    let entry_name = store.get_attribute(device_entry, "Dname").unwrap_or("");
    let entry_variant = store.get_attribute(device_entry, "Dvariant").unwrap_or("");

    let target_vendor = target.get_attribute(target_device, "Dvendor").unwrap_or("");
    let target_name = target.get_attribute(target_device, "Dname").unwrap_or("");
    let target_variant = target.get_attribute(target_device, "Dvariant").unwrap_or("");

    if !entry_vendor.is_empty()
        && vendor_table.matches(entry_vendor, target_vendor) != VendorMatch::Match
    {
        return false;
    }
    if !entry_name.is_empty() && !wildcard_match(entry_name, target_name) {
        return false;
    }
    if !entry_variant.is_empty() && entry_variant != target_variant {
        return false;
    }
    true
}

/// `IsCompatibleWithDevice` (§3.5): a board is compatible with a target
/// device if any of its `mountedDevice`/`compatibleDevice` children
/// matches the target's `Dname`/`Dvariant` with vendor fuzzy-match.
pub fn is_compatible_with_device(
    board_store: &ItemStore,
    board: ItemHandle,
    vendor_table: &CanonicalVendorTable,
    target_store: &ItemStore,
    target_device: ItemHandle,
) -> bool {
    board_store
        .children(board)
        .iter()
        .copied()
        .filter(|c| matches!(board_store.tag(*c), "mountedDevice" | "compatibleDevice"))
        .any(|d| device_matches(board_store, d, vendor_table, target_store, target_device))
}

/// A `<debugProbe>` child is keyed by `(Pname, deviceIndex)` (§3.5).
pub fn debug_probe_key(store: &ItemStore, probe: ItemHandle) -> (String, String) {
    (
        store.get_attribute(probe, "Pname").unwrap_or("").to_string(),
        store.get_attribute(probe, "deviceIndex").unwrap_or("0").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_is_compatible_when_mounted_device_name_matches() {
        let mut board_store = ItemStore::new();
        let board = board_store.create_child(None, "board");
        let mounted = board_store.create_child(Some(board), "mountedDevice");
        board_store.add_attribute(mounted, "Dvendor", "ARM", true);
        board_store.add_attribute(mounted, "Dname", "ARMCM*", true);

        let mut target_store = ItemStore::new();
        let device = target_store.create_child(None, "device");
        target_store.add_attribute(device, "Dvendor", "ARM", true);
        target_store.add_attribute(device, "Dname", "ARMCM3", true);

        let vendor_table = CanonicalVendorTable::new();
        assert!(is_compatible_with_device(&board_store, board, &vendor_table, &target_store, device));
    }

    #[test]
    fn board_is_incompatible_when_no_device_matches() {
        let mut board_store = ItemStore::new();
        let board = board_store.create_child(None, "board");
        let mounted = board_store.create_child(Some(board), "mountedDevice");
        board_store.add_attribute(mounted, "Dname", "ARMCM4", true);

        let mut target_store = ItemStore::new();
        let device = target_store.create_child(None, "device");
        target_store.add_attribute(device, "Dname", "ARMCM3", true);

        let vendor_table = CanonicalVendorTable::new();
        assert!(!is_compatible_with_device(&board_store, board, &vendor_table, &target_store, device));
    }
}
