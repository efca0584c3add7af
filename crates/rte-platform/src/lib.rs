//! Attribute-matching primitives shared by the condition engine: wildcard
//! comparison, the canonical-vendor synonym table, and the `Dcdecp` bitmask
//! test used by device/processor expressions.

mod vendor;
mod wildcard;

pub use vendor::{CanonicalVendorTable, VendorMatch};
pub use wildcard::wildcard_match;

/// Evaluates a `Dcdecp` expression attribute against a device's debug/trace
/// capability bitmask. Both sides are decimal-encoded bitmasks; the
/// expression is satisfied when the intersection is non-empty.
pub fn dcdecp_match(expr_mask: &str, device_mask: &str) -> bool {
    let (Ok(want), Ok(have)) = (expr_mask.parse::<u32>(), device_mask.parse::<u32>()) else {
        return false;
    };
    want & have != 0
}
