//! Resource - Declared attributes and the state computed from them

use std::collections::HashMap;

/// Unique identifier for a resource or data source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "tenant_role", "permission_set")
    pub resource_type: String,
    /// Resource name (label given in configuration)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }

    /// Convert from JSON
    ///
    /// `null` and numbers outside `i64` have no attribute form and are
    /// rejected with their path rather than skipped.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, ValueError> {
        Value::from_json_at(json, "value")
    }

    fn from_json_at(json: &serde_json::Value, path: &str) -> Result<Value, ValueError> {
        match json {
            serde_json::Value::Null => Err(ValueError::unsupported(path, "null")),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| ValueError::unsupported(path, format!("number {}", n))),
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Value::from_json_at(item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let value = Value::from_json_at(v, &format!("{}.{}", path, k))?;
                    Ok::<_, ValueError>((k.clone(), value))
                })
                .collect::<Result<HashMap<_, _>, _>>()
                .map(Value::Map),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Error converting JSON into attribute values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Unsupported {found} at {path}")]
    Unsupported { path: String, found: String },

    #[error("Expected a JSON object of attributes, got {found}")]
    NotAnObject { found: String },
}

impl ValueError {
    fn unsupported(path: &str, found: impl Into<String>) -> Self {
        ValueError::Unsupported {
            path: path.to_string(),
            found: found.into(),
        }
    }
}

/// Convert a JSON object into an attribute map
///
/// A top-level `null` attribute reads as unset. Nested `null` values are errors.
pub fn attributes_from_json(
    json: &serde_json::Value,
) -> Result<HashMap<String, Value>, ValueError> {
    let serde_json::Value::Object(map) = json else {
        let found = match json {
            serde_json::Value::Array(_) => "array",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::Bool(_) => "bool",
            _ => "null",
        };
        return Err(ValueError::NotAnObject {
            found: found.to_string(),
        });
    };

    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| Ok::<_, ValueError>((k.clone(), Value::from_json_at(v, k)?)))
        .collect()
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// State computed by the provider (inputs plus computed attributes)
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl State {
    pub fn new(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self { id, attributes }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_object_to_attributes() {
        let attrs = attributes_from_json(&json!({
            "default_group_permission": "read",
            "group_permission": [{"id": 1, "access": "full"}],
            "unused": null,
        }))
        .unwrap();

        assert_eq!(
            attrs.get("default_group_permission"),
            Some(&Value::string("read"))
        );
        assert!(!attrs.contains_key("unused"));
        let groups = attrs["group_permission"].as_list().unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn non_object_json_has_no_attributes() {
        assert_eq!(
            attributes_from_json(&json!([1, 2])),
            Err(ValueError::NotAnObject {
                found: "array".to_string()
            })
        );
        assert!(attributes_from_json(&json!("text")).is_err());
    }

    #[test]
    fn null_list_item_is_rejected_with_its_index() {
        let error = attributes_from_json(&json!({
            "override_permission_sets": [null, "{}", "{"],
        }))
        .unwrap_err();
        assert_eq!(
            error,
            ValueError::Unsupported {
                path: "override_permission_sets[0]".to_string(),
                found: "null".to_string(),
            }
        );
    }

    #[test]
    fn null_block_is_rejected() {
        let error = attributes_from_json(&json!({
            "group_permission": [{"id": 5, "access": "full"}, null],
        }))
        .unwrap_err();
        assert_eq!(error.to_string(), "Unsupported null at group_permission[1]");
    }

    #[test]
    fn non_integer_ids_are_rejected() {
        let error = attributes_from_json(&json!({
            "group_permission": [{"id": 1.5, "access": "full"}],
        }))
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unsupported number 1.5 at group_permission[0].id"
        );

        let error = attributes_from_json(&json!({
            "task_permission": [{"id": u64::MAX, "access": "full"}],
        }))
        .unwrap_err();
        assert!(matches!(
            error,
            ValueError::Unsupported { ref path, .. } if path == "task_permission[0].id"
        ));
    }

    #[test]
    fn nested_conversion_keeps_positions() {
        let value = Value::from_json(&json!(["a", ["b", 2], {"c": true}])).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::string("a"),
                Value::List(vec![Value::string("b"), Value::Int(2)]),
                Value::Map(HashMap::from([("c".to_string(), Value::Bool(true))])),
            ])
        );
        assert!(Value::from_json(&json!(null)).is_err());
    }

    #[test]
    fn value_to_json() {
        let value = Value::List(vec![Value::Int(3), Value::Bool(true), Value::string("x")]);
        assert_eq!(value.to_json(), json!([3, true, "x"]));
    }

    #[test]
    fn resource_id_display() {
        assert_eq!(
            ResourceId::new("tenant_role", "ops").to_string(),
            "tenant_role.ops"
        );
    }
}
