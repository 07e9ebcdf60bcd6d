//! Field definitions for node type schemas.

use crate::value::Value;
use std::collections::BTreeMap;

/// The type of a node field.
///
/// Wire scalars arrive string-encoded; each variant knows how to coerce the
/// decoded wire value into its parsed form and what its typed default is.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Boolean, encoded as "true"/"false" on the wire.
    Boolean,
    /// Number, encoded as a numeric string on the wire.
    Number,
    /// Nested object with declared fields. Stored flattened on the wire.
    Object(Vec<FieldSpec>),
    /// Array with a uniform element type.
    Array(Box<FieldType>),
    /// Free-form object with arbitrary keys and a uniform value type.
    Record(Box<FieldType>),
}

impl FieldType {
    /// Coerces a decoded wire value into this type's parsed form.
    ///
    /// Failures are recoverable at the field level: the caller logs the
    /// returned message and substitutes [`FieldType::default_value`].
    pub fn parse(&self, raw: &Value) -> Result<Value, String> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldType::String => match raw {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(format_number(*n))),
                Value::Boolean(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("expected string, got {:?}", other)),
            },
            FieldType::Boolean => match raw {
                Value::Boolean(b) => Ok(Value::Boolean(*b)),
                Value::String(s) if s == "true" => Ok(Value::Boolean(true)),
                Value::String(s) if s == "false" => Ok(Value::Boolean(false)),
                other => Err(format!("expected boolean, got {:?}", other)),
            },
            FieldType::Number => match raw {
                Value::Number(n) => Ok(Value::Number(*n)),
                Value::String(s) => s
                    .parse::<f64>()
                    .map(Value::Number)
                    .map_err(|_| format!("expected number, got {:?}", s)),
                other => Err(format!("expected number, got {:?}", other)),
            },
            FieldType::Object(specs) => match raw {
                Value::Object(map) => {
                    // Absent declared fields are filled with defaults so a
                    // parsed object never has a missing leaf.
                    let mut parsed = BTreeMap::new();
                    for spec in specs {
                        match map.get(spec.name()) {
                            Some(v) => {
                                parsed.insert(spec.name().to_string(), spec.field_type().parse(v)?);
                            }
                            None => {
                                parsed.insert(spec.name().to_string(), spec.default_value());
                            }
                        }
                    }
                    Ok(Value::Object(parsed))
                }
                other => Err(format!("expected object, got {:?}", other)),
            },
            FieldType::Array(elem) => match raw {
                Value::Array(items) => {
                    let mut parsed = Vec::with_capacity(items.len());
                    for item in items {
                        parsed.push(elem.parse(item)?);
                    }
                    Ok(Value::Array(parsed))
                }
                other => Err(format!("expected array, got {:?}", other)),
            },
            FieldType::Record(value_type) => match raw {
                Value::Object(map) => {
                    let mut parsed = BTreeMap::new();
                    for (key, v) in map {
                        parsed.insert(key.clone(), value_type.parse(v)?);
                    }
                    Ok(Value::Object(parsed))
                }
                other => Err(format!("expected record, got {:?}", other)),
            },
        }
    }

    /// Returns the typed default for this type.
    ///
    /// Optional fields default to `Null`; object defaults recurse so every
    /// declared leaf has a value.
    pub fn default_value(&self, optional: bool) -> Value {
        if optional {
            return Value::Null;
        }
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Boolean => Value::Boolean(false),
            FieldType::Number => Value::Number(0.0),
            FieldType::Object(specs) => Value::Object(
                specs
                    .iter()
                    .map(|s| (s.name().to_string(), s.default_value()))
                    .collect(),
            ),
            FieldType::Array(_) => Value::Array(Vec::new()),
            FieldType::Record(_) => Value::Object(BTreeMap::new()),
        }
    }
}

/// Formats a wire number without a trailing `.0` for integral values.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A field definition in a node type schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    /// Field name.
    name: String,
    /// Field type.
    field_type: FieldType,
    /// Whether this field may be null.
    optional: bool,
}

impl FieldSpec {
    /// Creates a new required field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: false,
        }
    }

    /// Sets whether this field is optional.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Returns the field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    #[inline]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns whether this field is optional.
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns the default value for this field.
    pub fn default_value(&self) -> Value {
        self.field_type.default_value(self.optional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(
            FieldType::Boolean.parse(&Value::String("true".into())),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            FieldType::Number.parse(&Value::String("9000.1".into())),
            Ok(Value::Number(9000.1))
        );
        assert_eq!(
            FieldType::String.parse(&Value::String("hello".into())),
            Ok(Value::String("hello".into()))
        );
    }

    #[test]
    fn test_scalar_parse_failure() {
        assert!(FieldType::Boolean.parse(&Value::String("yes".into())).is_err());
        assert!(FieldType::Number.parse(&Value::String("abc".into())).is_err());
        assert!(FieldType::Number
            .parse(&Value::Array(Vec::new()))
            .is_err());
    }

    #[test]
    fn test_null_passthrough() {
        assert_eq!(FieldType::Number.parse(&Value::Null), Ok(Value::Null));
        assert_eq!(FieldType::Boolean.parse(&Value::Null), Ok(Value::Null));
    }

    #[test]
    fn test_object_parse_fills_absent_fields() {
        let ty = FieldType::Object(vec![
            FieldSpec::new("city", FieldType::String),
            FieldSpec::new("zip", FieldType::String),
        ]);
        let mut raw = std::collections::BTreeMap::new();
        raw.insert("city".to_string(), Value::String("Reno".into()));
        let parsed = ty.parse(&Value::Object(raw)).unwrap();
        let obj = parsed.as_object().unwrap();
        assert_eq!(obj.get("city"), Some(&Value::String("Reno".into())));
        assert_eq!(obj.get("zip"), Some(&Value::String(String::new())));
    }

    #[test]
    fn test_array_elements_parsed_per_spec() {
        let ty = FieldType::Array(Box::new(FieldType::Number));
        let parsed = ty
            .parse(&Value::Array(vec![
                Value::String("1".into()),
                Value::Number(2.0),
            ]))
            .unwrap();
        assert_eq!(
            parsed,
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_default_values() {
        assert_eq!(
            FieldType::String.default_value(false),
            Value::String(String::new())
        );
        assert_eq!(FieldType::Boolean.default_value(false), Value::Boolean(false));
        assert_eq!(FieldType::Number.default_value(true), Value::Null);
        assert_eq!(
            FieldType::Array(Box::new(FieldType::String)).default_value(false),
            Value::Array(Vec::new())
        );

        let ty = FieldType::Object(vec![
            FieldSpec::new("lat", FieldType::Number),
            FieldSpec::new("lng", FieldType::Number).optional(true),
        ]);
        let def = ty.default_value(false);
        let obj = def.as_object().unwrap();
        assert_eq!(obj.get("lat"), Some(&Value::Number(0.0)));
        assert_eq!(obj.get("lng"), Some(&Value::Null));
    }
}
