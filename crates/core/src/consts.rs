//! Reserved wire constants and identity property names.
//!
//! The wire format stores nested objects as flattened key/value pairs and
//! carries a handful of reserved string encodings. Every constant here is
//! multi-character and rejected inside declared field names at registration,
//! so none can collide with a real property path.

/// Separator joining nested object paths into flattened wire keys.
pub const PATH_SEPARATOR: &str = "__dot__";

/// Sentinel string representing an explicit null on the wire.
pub const NULL_SENTINEL: &str = "__NULL__";

/// Prefix tagging a string as escaped, embedded JSON (arrays and records).
pub const JSON_TAG: &str = "__JSON__";

/// Separator joining a relation alias to a union member type name.
pub const UNION_ALIAS_SEPARATOR: &str = "__on__";

/// Identity property: stable node id.
pub const PROP_ID: &str = "id";

/// Identity property: monotonic node version.
pub const PROP_VERSION: &str = "version";

/// Identity property: last editor of the node.
pub const PROP_LAST_UPDATED_BY: &str = "lastUpdatedBy";

/// Identity property: node type name.
pub const PROP_TYPE: &str = "type";

/// Properties auto-injected at every query entry root. Callers may not
/// re-declare these as fields.
pub const IDENTITY_PROPERTIES: [&str; 4] =
    [PROP_ID, PROP_VERSION, PROP_LAST_UPDATED_BY, PROP_TYPE];

/// Returns true if `name` is one of the auto-injected identity properties.
pub fn is_identity_property(name: &str) -> bool {
    IDENTITY_PROPERTIES.contains(&name)
}

/// Joins a root path and a leaf name with the reserved separator.
pub fn join_path(root: &str, leaf: &str) -> String {
    let mut path = String::with_capacity(root.len() + PATH_SEPARATOR.len() + leaf.len());
    path.push_str(root);
    path.push_str(PATH_SEPARATOR);
    path.push_str(leaf);
    path
}

/// Splits a flattened path into its first segment and the remainder.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.find(PATH_SEPARATOR) {
        Some(at) => (&path[..at], Some(&path[at + PATH_SEPARATOR.len()..])),
        None => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_properties() {
        assert!(is_identity_property("id"));
        assert!(is_identity_property("version"));
        assert!(is_identity_property("lastUpdatedBy"));
        assert!(is_identity_property("type"));
        assert!(!is_identity_property("name"));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("address", "city"), "address__dot__city");
        assert_eq!(
            join_path("address__dot__geo", "lat"),
            "address__dot__geo__dot__lat"
        );
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("name"), ("name", None));
        assert_eq!(split_path("address__dot__city"), ("address", Some("city")));
        assert_eq!(
            split_path("address__dot__geo__dot__lat"),
            ("address", Some("geo__dot__lat"))
        );
    }
}
