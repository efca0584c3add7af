//! Support code shared by the RTE crates: pack-id ordering, alphanumeric
//! comparison, and diagnostic-string formatting. Mirrors the role
//! `cargo-util` plays for `cargo` — small, dependency-light, no domain
//! model of its own.

mod diagnostic;
mod pack_id;

pub use diagnostic::{format_item_error, Severity};
pub use pack_id::{alnum_compare, compare_pack_ids, PackKey};
