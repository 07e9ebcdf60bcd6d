//! Decode and encode of reserved wire scalar encodings.
//!
//! The wire format is legacy-compatible JSON with three quirks:
//!
//! - null is the reserved sentinel string, distinct from native null
//! - arrays and free-form nested data travel as a string prefixed with the
//!   reserved JSON tag and escaped for literal embedding
//! - nested object fields may arrive flattened into sibling keys joined by
//!   the reserved path separator
//!
//! Decoding translates all three back into native [`Value`]s. Scalar
//! *coercion* (string-encoded booleans and numbers) is not done here; it is
//! driven by field specs at the data-object layer.

use plexus_core::{Value, JSON_TAG, NULL_SENTINEL, PATH_SEPARATOR};
use serde_json::Map;
use std::collections::BTreeMap;

/// Decodes a raw wire value into a native [`Value`].
///
/// Sentinel strings decode to `Null`; tagged strings are unescaped and
/// parsed as embedded JSON. A tagged string that fails to parse is kept as
/// a plain string, leaving recovery to the field-spec layer.
pub fn decode_value(raw: &serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => decode_string(s),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(decode_value).collect()),
        serde_json::Value::Object(map) => {
            let mut entries = BTreeMap::new();
            for (key, v) in map {
                entries.insert(key.clone(), decode_value(v));
            }
            Value::Object(entries)
        }
    }
}

fn decode_string(s: &str) -> Value {
    if s == NULL_SENTINEL {
        return Value::Null;
    }
    if let Some(tagged) = s.strip_prefix(JSON_TAG) {
        let unescaped = unescape_embedded(tagged);
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&unescaped) {
            return decode_value(&parsed);
        }
    }
    Value::String(s.to_string())
}

/// Merges flattened `root__dot__nested` sibling keys into nested objects.
///
/// Natively nested siblings deep-merge with collapsed ones; on a leaf
/// conflict the flattened key wins (it is the later, more specific write).
pub fn collapse_flattened(map: &Map<String, serde_json::Value>) -> Map<String, serde_json::Value> {
    let mut out = Map::new();
    for (key, value) in map {
        match key.split_once(PATH_SEPARATOR) {
            None => {
                merge_entry(&mut out, key, value.clone());
            }
            Some((root, rest)) => {
                let mut nested = Map::new();
                insert_path(&mut nested, rest, value.clone());
                merge_entry(&mut out, root, serde_json::Value::Object(nested));
            }
        }
    }
    out
}

fn insert_path(map: &mut Map<String, serde_json::Value>, path: &str, value: serde_json::Value) {
    match path.split_once(PATH_SEPARATOR) {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((root, rest)) => {
            let mut nested = Map::new();
            insert_path(&mut nested, rest, value);
            merge_entry(map, root, serde_json::Value::Object(nested));
        }
    }
}

fn merge_entry(map: &mut Map<String, serde_json::Value>, key: &str, value: serde_json::Value) {
    match (map.get_mut(key), value) {
        (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
            for (k, v) in incoming {
                merge_entry(existing, &k, v);
            }
        }
        (_, value) => {
            map.insert(key.to_string(), value);
        }
    }
}

/// Escapes a JSON string for literal embedding inside a tagged wire string.
pub fn escape_embedded(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`escape_embedded`].
pub fn unescape_embedded(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Encodes a JSON value as a tagged, escaped wire string.
pub fn tag_json(value: &serde_json::Value) -> String {
    let mut out = String::from(JSON_TAG);
    out.push_str(&escape_embedded(&value.to_string()));
    out
}

/// Encodes an explicit null as the wire sentinel.
pub fn encode_null() -> serde_json::Value {
    serde_json::Value::String(NULL_SENTINEL.to_string())
}

/// Encodes a boolean in its wire string form.
pub fn encode_bool(b: bool) -> serde_json::Value {
    serde_json::Value::String(b.to_string())
}

/// Encodes a number in its wire string form.
pub fn encode_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.is_finite() {
        serde_json::Value::String(format!("{}", n as i64))
    } else {
        serde_json::Value::String(format!("{}", n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_native_scalars() {
        assert_eq!(decode_value(&json!(null)), Value::Null);
        assert_eq!(decode_value(&json!(true)), Value::Boolean(true));
        assert_eq!(decode_value(&json!(1.5)), Value::Number(1.5));
        assert_eq!(decode_value(&json!("abc")), Value::String("abc".into()));
    }

    #[test]
    fn test_decode_null_sentinel() {
        assert_eq!(decode_value(&json!("__NULL__")), Value::Null);
    }

    #[test]
    fn test_decode_tagged_json() {
        let tagged = tag_json(&json!(["a", "b"]));
        assert_eq!(
            decode_value(&serde_json::Value::String(tagged)),
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())])
        );
    }

    #[test]
    fn test_decode_tagged_json_with_quotes() {
        let tagged = tag_json(&json!({ "note": "say \"hi\"" }));
        let decoded = decode_value(&serde_json::Value::String(tagged));
        let obj = decoded.as_object().unwrap();
        assert_eq!(obj.get("note"), Some(&Value::String("say \"hi\"".into())));
    }

    #[test]
    fn test_malformed_tagged_json_stays_string() {
        let raw = serde_json::Value::String("__JSON__{not json".to_string());
        assert_eq!(
            decode_value(&raw),
            Value::String("__JSON__{not json".into())
        );
    }

    #[test]
    fn test_escape_round_trip() {
        let raw = r#"a "quoted" \ backslash"#;
        assert_eq!(unescape_embedded(&escape_embedded(raw)), raw);
    }

    #[test]
    fn test_collapse_flattened() {
        let map = json!({
            "task": "write tests",
            "meta__dot__priority": "3",
            "meta__dot__geo__dot__lat": "1.5"
        });
        let collapsed = collapse_flattened(map.as_object().unwrap());
        assert_eq!(collapsed.get("task"), Some(&json!("write tests")));
        let meta = collapsed.get("meta").unwrap().as_object().unwrap();
        assert_eq!(meta.get("priority"), Some(&json!("3")));
        let geo = meta.get("geo").unwrap().as_object().unwrap();
        assert_eq!(geo.get("lat"), Some(&json!("1.5")));
    }

    #[test]
    fn test_collapse_merges_native_nested_siblings() {
        let map = json!({
            "meta": { "done": "true" },
            "meta__dot__priority": "3"
        });
        let collapsed = collapse_flattened(map.as_object().unwrap());
        let meta = collapsed.get("meta").unwrap().as_object().unwrap();
        assert_eq!(meta.get("done"), Some(&json!("true")));
        assert_eq!(meta.get("priority"), Some(&json!("3")));
    }

    #[test]
    fn test_encode_helpers() {
        assert_eq!(encode_null(), json!("__NULL__"));
        assert_eq!(encode_bool(true), json!("true"));
        assert_eq!(encode_number(42.0), json!("42"));
        assert_eq!(encode_number(1.25), json!("1.25"));
    }
}
