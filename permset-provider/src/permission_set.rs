//! Permission set data source
//!
//! Builds a permission document from typed configuration attributes, applies
//! the `override_permission_sets` documents on top and exposes the merged
//! document as the computed `json` attribute.

use std::collections::HashMap;

use log::debug;
use permset_core::document::Collection;
use permset_core::merge::parse_overrides;
use permset_core::{
    Category, CodePermission, DefaultField, IdPermission, KeyKind, Merger, PermissionDocument,
};

use crate::provider::{ProviderError, ProviderResult, ResourceType};
use crate::resource::{Resource, State, Value};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub const OVERRIDE_PERMISSION_SETS: &str = "override_permission_sets";
pub const JSON: &str = "json";

/// Attribute holding a category's entries (e.g., "group_permission")
pub fn block_attribute(category: Category) -> String {
    format!("{}_permission", category.name())
}

/// Schema attributes shared by everything that declares a permission document
pub fn permission_attributes() -> Vec<AttributeSchema> {
    let mut attributes = Vec::new();

    for field in DefaultField::ALL {
        attributes.push(
            AttributeSchema::new(
                field.json_field(),
                AttributeType::enumeration(field.allowed_values()),
            )
            .with_description(format!("Default {} access", field.category())),
        );
    }

    for category in Category::ALL {
        let key_type = match category.key_kind() {
            KeyKind::Id => AttributeType::Int,
            KeyKind::Code => AttributeType::String,
        };
        let block = AttributeType::Block(vec![
            AttributeSchema::new(category.key_kind().field(), key_type).required(),
            AttributeSchema::new(
                "access",
                AttributeType::enumeration(category.access_values()),
            )
            .required(),
        ]);
        attributes.push(
            AttributeSchema::new(block_attribute(category), AttributeType::List(Box::new(block)))
                .with_description(format!("{} permissions", category)),
        );
    }

    attributes
}

/// Build a permission document from declared attributes
///
/// Attributes are expected to have passed schema validation; shape errors are
/// still reported rather than skipped.
pub fn expand_document(attributes: &HashMap<String, Value>) -> ProviderResult<PermissionDocument> {
    let mut doc = PermissionDocument::new();

    for field in DefaultField::ALL {
        match attributes.get(field.json_field()) {
            None => {}
            Some(Value::String(s)) => doc.set_default(field, Some(s.clone())),
            Some(other) => {
                return Err(ProviderError::new(format!(
                    "{} must be a string, got {}",
                    field.json_field(),
                    other.type_name()
                )));
            }
        }
    }

    for category in Category::ALL {
        let name = block_attribute(category);
        let Some(value) = attributes.get(&name) else {
            continue;
        };
        let items = value
            .as_list()
            .ok_or_else(|| ProviderError::new(format!("{} must be a list", name)))?;

        for (index, item) in items.iter().enumerate() {
            let Value::Map(entry) = item else {
                return Err(ProviderError::new(format!(
                    "{}[{}] must be a block",
                    name, index
                )));
            };
            let access = entry
                .get("access")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProviderError::new(format!("{}[{}].access must be a string", name, index))
                })?;
            let key_field = category.key_kind().field();
            let key = entry.get(key_field);

            doc = match category.key_kind() {
                KeyKind::Id => {
                    let id = key.and_then(Value::as_int).ok_or_else(|| {
                        ProviderError::new(format!(
                            "{}[{}].{} must be an integer",
                            name, index, key_field
                        ))
                    })?;
                    doc.with_id_permission(category, id, access)
                }
                KeyKind::Code => {
                    let code = key.and_then(Value::as_str).ok_or_else(|| {
                        ProviderError::new(format!(
                            "{}[{}].{} must be a string",
                            name, index, key_field
                        ))
                    })?;
                    doc.with_code_permission(category, code, access)
                }
            };
        }
    }

    Ok(doc)
}

/// Convert a permission document back into declared attributes
pub fn flatten_document(doc: &PermissionDocument) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();

    for field in DefaultField::ALL {
        if let Some(value) = doc.default_value(field) {
            attributes.insert(field.json_field().to_string(), Value::string(value));
        }
    }

    for category in Category::ALL {
        let blocks = match doc.collection(category) {
            Collection::Id(entries) if !entries.is_empty() => id_blocks(entries),
            Collection::Code(entries) if !entries.is_empty() => code_blocks(entries),
            _ => continue,
        };
        attributes.insert(block_attribute(category), Value::List(blocks));
    }

    attributes
}

fn id_blocks(entries: &[IdPermission]) -> Vec<Value> {
    entries
        .iter()
        .map(|e| {
            Value::Map(HashMap::from([
                ("id".to_string(), Value::Int(e.id)),
                ("access".to_string(), Value::string(&e.access)),
            ]))
        })
        .collect()
}

fn code_blocks(entries: &[CodePermission]) -> Vec<Value> {
    entries
        .iter()
        .map(|e| {
            Value::Map(HashMap::from([
                ("code".to_string(), Value::string(&e.code)),
                ("access".to_string(), Value::string(&e.access)),
            ]))
        })
        .collect()
}

/// Parse the `override_permission_sets` attribute, if declared
pub fn override_documents(
    attributes: &HashMap<String, Value>,
) -> ProviderResult<Vec<PermissionDocument>> {
    let Some(value) = attributes.get(OVERRIDE_PERMISSION_SETS) else {
        return Ok(Vec::new());
    };
    let items = value.as_list().ok_or_else(|| {
        ProviderError::new(format!("{} must be a list", OVERRIDE_PERMISSION_SETS))
    })?;

    let mut texts = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let text = item.as_str().ok_or_else(|| {
            ProviderError::new(format!(
                "{}[{}] must be a string",
                OVERRIDE_PERMISSION_SETS, index
            ))
        })?;
        texts.push(text);
    }

    Ok(parse_overrides(&texts)?)
}

/// `permission_set` data source
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionSetDataSource {
    merger: Merger,
}

impl PermissionSetDataSource {
    pub const NAME: &'static str = "permission_set";

    pub fn new(merger: Merger) -> Self {
        Self { merger }
    }

    /// Compute the merged document for declared attributes
    pub fn document(&self, resource: &Resource) -> ProviderResult<PermissionDocument> {
        self.schema()
            .validate(&resource.attributes)
            .map_err(|errors| {
                ProviderError::invalid_attributes(&errors).for_resource(resource.id.clone())
            })?;

        let base = expand_document(&resource.attributes)
            .map_err(|e| e.for_resource(resource.id.clone()))?;
        let overrides = override_documents(&resource.attributes)
            .map_err(|e| e.for_resource(resource.id.clone()))?;

        debug!(
            "Reading {} with {} override permission sets",
            resource.id,
            overrides.len()
        );

        self.merger
            .merge(&base, &overrides)
            .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))
    }

    /// Read the data source: declared attributes plus the computed `json`
    pub fn read(&self, resource: &Resource) -> ProviderResult<State> {
        let merged = self.document(resource)?;
        let json = merged.to_json_pretty().map_err(|e| {
            ProviderError::new("Failed to serialize permission set")
                .for_resource(resource.id.clone())
                .with_cause(e)
        })?;

        let mut attributes = resource.attributes.clone();
        attributes.insert(JSON.to_string(), Value::String(json));
        Ok(State::new(resource.id.clone(), attributes))
    }
}

impl ResourceType for PermissionSetDataSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schema(&self) -> ResourceSchema {
        let mut schema = ResourceSchema::new(Self::NAME)
            .with_description("Builds a permission set document from typed attributes");
        for attribute in permission_attributes() {
            schema = schema.attribute(attribute);
        }
        schema
            .attribute(
                AttributeSchema::new(
                    OVERRIDE_PERMISSION_SETS,
                    AttributeType::List(Box::new(types::permission_set_json())),
                )
                .with_description("Permission set documents applied in order, last wins"),
            )
            .attribute(
                AttributeSchema::new(JSON, AttributeType::String)
                    .computed()
                    .with_description("Merged permission set document"),
            )
    }

    fn is_data_source(&self) -> bool {
        true
    }
}
