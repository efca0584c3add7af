use semver::Version;
use std::cmp::Ordering;

/// A pack's sortable identity: the version-stripped `Vendor.Name` and its
/// release version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackKey {
    pub common_id: String,
    pub version: Version,
}

impl PackKey {
    pub fn new(common_id: impl Into<String>, version: Version) -> Self {
        Self {
            common_id: common_id.into(),
            version,
        }
    }
}

/// Orders pack keys the way the global model's `packages` map is kept
/// sorted: alphanumeric ascending on `common_id`, except any `common_id`
/// starting with `"Keil"` (case-sensitive prefix) sorts to the end, so
/// device-vendor packs are preferred on tie-break elsewhere; within equal
/// `common_id`, newer versions sort first.
pub fn compare_pack_ids(a: &PackKey, b: &PackKey) -> Ordering {
    let a_keil = a.common_id.starts_with("Keil");
    let b_keil = b.common_id.starts_with("Keil");
    match (a_keil, b_keil) {
        (false, true) => return Ordering::Less,
        (true, false) => return Ordering::Greater,
        _ => {}
    }
    match alnum_compare(&a.common_id, &b.common_id) {
        Ordering::Equal => b.version.cmp(&a.version),
        other => other,
    }
}

/// Length-aware alphanumeric comparison: runs of digits compare by numeric
/// value (so `"Device2"` sorts before `"Device10"`), runs of non-digits
/// compare byte-wise. Used for `common_id` ordering where names frequently
/// embed part numbers.
pub fn alnum_compare(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ca), Some(&cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let a_run = take_digits(&mut ai);
                    let b_run = take_digits(&mut bi);
                    let a_val: u128 = a_run.parse().unwrap_or(0);
                    let b_val: u128 = b_run.parse().unwrap_or(0);
                    match a_val.cmp(&b_val) {
                        Ordering::Equal => match a_run.len().cmp(&b_run.len()) {
                            Ordering::Equal => continue,
                            other => return other,
                        },
                        other => return other,
                    }
                } else {
                    ai.next();
                    bi.next();
                    match ca.cmp(&cb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_digits(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(&c) = iter.peek() {
        if c.is_ascii_digit() {
            s.push(c);
            iter.next();
        } else {
            break;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_runs_compare_numerically() {
        assert_eq!(alnum_compare("Device2", "Device10"), Ordering::Less);
        assert_eq!(alnum_compare("Device10", "Device2"), Ordering::Greater);
        assert_eq!(alnum_compare("Device02", "Device2"), Ordering::Less);
    }

    #[test]
    fn keil_packs_sort_last() {
        let keil = PackKey::new("Keil.ARMCM", Version::new(1, 0, 0));
        let other = PackKey::new("ARM.CMSIS", Version::new(1, 0, 0));
        assert_eq!(compare_pack_ids(&keil, &other), Ordering::Greater);
        assert_eq!(compare_pack_ids(&other, &keil), Ordering::Less);
    }

    #[test]
    fn equal_common_id_orders_newer_version_first() {
        let v1 = PackKey::new("ARM.CMSIS", Version::new(5, 9, 0));
        let v2 = PackKey::new("ARM.CMSIS", Version::new(6, 0, 0));
        assert_eq!(compare_pack_ids(&v2, &v1), Ordering::Less);
    }
}
