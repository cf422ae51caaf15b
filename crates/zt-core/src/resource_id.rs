//! Resource identifier helpers

use regex::Regex;
use std::sync::OnceLock;

fn resource_group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)resourceGroups/([^/]*)/").expect("static resource group pattern")
    })
}

/// Resource group segment of a resource id, if the id is group-scoped.
pub fn resource_group(id: &str) -> Option<&str> {
    resource_group_pattern()
        .captures(id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|rg| !rg.is_empty())
}

/// Last path segment of a resource id.
pub fn resource_name(id: &str) -> Option<&str> {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

/// Ids are compared case-insensitively, ignoring a trailing slash.
pub fn same_resource(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISK: &str =
        "/subscriptions/0000/resourceGroups/rg-data/providers/Microsoft.Compute/disks/disk1";

    #[test]
    fn test_resource_group() {
        assert_eq!(resource_group(DISK), Some("rg-data"));
        assert_eq!(
            resource_group("/subscriptions/0000/RESOURCEGROUPS/Rg-Upper/providers/x/y/z"),
            Some("Rg-Upper")
        );
        assert_eq!(resource_group("/subscriptions/0000"), None);
        assert_eq!(resource_group("/subscriptions/0000/resourceGroups/trailing"), None);
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name(DISK), Some("disk1"));
        assert_eq!(resource_name(""), None);
    }

    #[test]
    fn test_same_resource() {
        assert!(same_resource(&DISK.to_lowercase(), DISK));
        assert!(!same_resource(DISK, "/subscriptions/0000"));
    }
}
