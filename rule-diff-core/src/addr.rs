//! Address text helpers shared by rule compilation and state synthesis.

/// Expand a partial address against an optional segment prefix.
///
/// Any CIDR suffix is split off the address first; the prefix's trailing
/// separators are trimmed before joining so `"2001:db8:1::"` and
/// `"2001:db8:1:"` expand identically. With an empty prefix the address is
/// returned unchanged.
pub fn expand(address: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return address.to_string();
    }
    let (body, suffix) = match address.split_once('/') {
        Some((body, cidr)) => (body, format!("/{cidr}")),
        None => (address, String::new()),
    };
    format!("{}:{}{}", prefix.trim_end_matches(':'), body, suffix)
}

/// Whether `addr` is structurally usable IPv6 text, optionally with a CIDR
/// suffix.
///
/// Partial-prefix expansions with fewer than eight segments are accepted;
/// text the rule tool would reject outright (triple colons, repeated
/// compression, oversized segments, out-of-range CIDR lengths) is not.
pub fn is_structurally_valid(addr: &str) -> bool {
    if addr.is_empty() {
        return false;
    }
    let body = match addr.split_once('/') {
        Some((body, cidr)) => match cidr.parse::<u32>() {
            Ok(len) if len <= 128 => body,
            _ => return false,
        },
        None => addr,
    };
    valid_address_body(body)
}

fn valid_address_body(body: &str) -> bool {
    if !body.contains(':') || body.contains(":::") {
        return false;
    }
    if body.matches("::").count() > 1 {
        return false;
    }
    let segments: Vec<&str> = body.split(':').collect();
    if body.contains("::") {
        let non_empty = segments.iter().filter(|s| !s.is_empty()).count();
        if non_empty > 7 {
            return false;
        }
    } else if segments.len() > 8 {
        return false;
    }
    segments
        .iter()
        .all(|seg| seg.len() <= 4 && seg.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Infer the longest shared segment prefix across `addresses`.
///
/// Candidate lengths run from three segments down to one, taken from the
/// first address. A candidate is accepted only when every address starts
/// with it and stripping it strictly shortens at least one address, so a
/// full address never counts as its own prefix.
pub fn common_prefix(addresses: &[String]) -> Option<String> {
    let first = addresses.first()?;
    let first_body = first.split('/').next().unwrap_or(first);
    let segments: Vec<&str> = first_body.split(':').collect();

    for prefix_len in (1..=3).rev() {
        if segments.len() < prefix_len {
            continue;
        }
        let candidate = format!("{}:", segments[..prefix_len].join(":"));
        let mut all_match = true;
        let mut reduces = false;
        for addr in addresses {
            let body = addr.split('/').next().unwrap_or(addr);
            if !body.starts_with(&candidate) {
                all_match = false;
                break;
            }
            let remainder = body[candidate.len()..].trim_start_matches(':');
            if !remainder.is_empty() && remainder != body {
                reduces = true;
            }
        }
        if all_match && reduces {
            return Some(candidate);
        }
    }
    None
}

/// Remove `prefix` (and any separator it exposes) from `address`.
///
/// Addresses that do not start with the prefix come back unchanged.
pub fn strip_prefix(address: &str, prefix: &str) -> String {
    if prefix.is_empty() || !address.starts_with(prefix) {
        return address.to_string();
    }
    address[prefix.len()..].trim_start_matches(':').to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{common_prefix, expand, is_structurally_valid, strip_prefix};

    #[test]
    fn expand_joins_prefix_and_preserves_cidr_suffix() {
        let expanded = expand("20:0:0/96", "2001:db8:1::");
        assert_eq!(expanded, "2001:db8:1:20:0:0/96");
        // Deterministic on repeated invocation.
        assert_eq!(expand("20:0:0/96", "2001:db8:1::"), expanded);
    }

    #[test]
    fn expand_without_prefix_is_identity() {
        assert_eq!(expand("2001:db8::1", ""), "2001:db8::1");
        assert_eq!(expand("20:0:0/96", ""), "20:0:0/96");
    }

    #[test]
    fn expand_trims_any_trailing_separator_style() {
        assert_eq!(expand("1", "fd00:"), "fd00:1");
        assert_eq!(expand("1", "fd00::"), "fd00:1");
    }

    #[test]
    fn validation_accepts_full_and_partial_addresses() {
        assert!(is_structurally_valid("2001:db8:0:0:0:0:0:1"));
        assert!(is_structurally_valid("2001:db8::1"));
        assert!(is_structurally_valid("2001:db8:1:20:0:0/96"));
        assert!(is_structurally_valid("::/0"));
    }

    #[test]
    fn validation_rejects_malformed_addresses() {
        assert!(!is_structurally_valid(""));
        assert!(!is_structurally_valid("192.0.2.1"));
        assert!(!is_structurally_valid("2001:::1"));
        assert!(!is_structurally_valid("2001::db8::1"));
        assert!(!is_structurally_valid("2001:db8:12345::1"));
        assert!(!is_structurally_valid("2001:db8::1/129"));
        assert!(!is_structurally_valid("2001:db8::zz"));
        assert!(!is_structurally_valid("1:2:3:4:5:6:7:8:9"));
    }

    #[test]
    fn common_prefix_selects_three_segment_prefix() {
        let addresses = vec![
            "2001:db8:1:20:0:0".to_string(),
            "2001:db8:1:21:0:0".to_string(),
            "2001:db8:1:22:0:0".to_string(),
        ];
        assert_eq!(common_prefix(&addresses), Some("2001:db8:1:".to_string()));
    }

    #[test]
    fn common_prefix_ignores_cidr_suffixes() {
        let addresses = vec![
            "2001:db8:1:20:0:0/96".to_string(),
            "2001:db8:1:21:0:0/96".to_string(),
        ];
        assert_eq!(common_prefix(&addresses), Some("2001:db8:1:".to_string()));
    }

    #[test]
    fn common_prefix_requires_every_address_to_match() {
        let addresses = vec![
            "2001:db8:1:20:0:0".to_string(),
            "fd5a:1:0:20:0:0".to_string(),
        ];
        assert_eq!(common_prefix(&addresses), None);
    }

    #[test]
    fn common_prefix_of_nothing_is_none() {
        assert_eq!(common_prefix(&[]), None);
    }

    #[test]
    fn strip_prefix_removes_prefix_and_separator() {
        assert_eq!(strip_prefix("2001:db8:1:20:0:0", "2001:db8:1:"), "20:0:0");
        assert_eq!(strip_prefix("fd5a:1:20:0:0", "2001:db8:1:"), "fd5a:1:20:0:0");
        assert_eq!(strip_prefix("2001:db8::1", ""), "2001:db8::1");
    }
}
