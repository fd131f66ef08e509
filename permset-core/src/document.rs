//! Document - The permission document and its entries
//!
//! A `PermissionDocument` is the wire shape exchanged with the platform: a set
//! of default scalars followed by one collection per category. Field order of
//! the struct is the emitted JSON order.

use std::fmt;
use std::hash::Hash;

use serde::de::Unexpected;
use serde::{Deserialize, Deserializer, Serialize};

use crate::category::{Category, DefaultField, KeyKind};

/// Common view over ID-keyed and code-keyed entries
pub trait PermissionEntry: Clone + PartialEq {
    type Key: Ord + Clone + Hash + fmt::Display;

    fn key(&self) -> &Self::Key;
    fn access(&self) -> &str;
    fn set_access(&mut self, access: String);
}

/// Entry of an ID-keyed collection (groups, instance types, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdPermission {
    pub id: i64,
    pub access: String,
}

impl IdPermission {
    pub fn new(id: i64, access: impl Into<String>) -> Self {
        Self {
            id,
            access: access.into(),
        }
    }
}

impl PermissionEntry for IdPermission {
    type Key = i64;

    fn key(&self) -> &i64 {
        &self.id
    }

    fn access(&self) -> &str {
        &self.access
    }

    fn set_access(&mut self, access: String) {
        self.access = access;
    }
}

/// Entry of a code-keyed collection (features, report types, personas)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodePermission {
    pub code: String,
    pub access: String,
}

impl CodePermission {
    pub fn new(code: impl Into<String>, access: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            access: access.into(),
        }
    }
}

impl PermissionEntry for CodePermission {
    type Key = String;

    fn key(&self) -> &String {
        &self.code
    }

    fn access(&self) -> &str {
        &self.access
    }

    fn set_access(&mut self, access: String) {
        self.access = access;
    }
}

/// Borrowed view of one category's collection
#[derive(Debug, Clone, Copy)]
pub enum Collection<'a> {
    Id(&'a [IdPermission]),
    Code(&'a [CodePermission]),
}

impl<'a> Collection<'a> {
    pub fn len(&self) -> usize {
        match self {
            Collection::Id(entries) => entries.len(),
            Collection::Code(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_kind(&self) -> KeyKind {
        match self {
            Collection::Id(_) => KeyKind::Id,
            Collection::Code(_) => KeyKind::Code,
        }
    }

    /// Entries as (key, access) pairs with the key rendered as a string
    pub fn pairs(&self) -> Vec<(String, &'a str)> {
        match *self {
            Collection::Id(entries) => entries
                .iter()
                .map(|e| (e.id.to_string(), e.access.as_str()))
                .collect(),
            Collection::Code(entries) => entries
                .iter()
                .map(|e| (e.code.clone(), e.access.as_str()))
                .collect(),
        }
    }
}

/// Mutable view of one category's collection
#[derive(Debug)]
pub enum CollectionMut<'a> {
    Id(&'a mut Vec<IdPermission>),
    Code(&'a mut Vec<CodePermission>),
}

/// Full set of default access levels and per-entity permissions of a role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionDocument {
    #[serde(skip_serializing_if = "is_unset")]
    pub default_group_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_instance_type_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_blueprint_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_report_type_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_persona: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_catalog_item_type_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_vdi_pool_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_workflow_permission: Option<String>,
    #[serde(skip_serializing_if = "is_unset")]
    pub default_task_permission: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub feature_permissions: Vec<CodePermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub group_permissions: Vec<IdPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub instance_type_permissions: Vec<IdPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub blueprint_permissions: Vec<IdPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub report_type_permissions: Vec<CodePermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub persona_permissions: Vec<CodePermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub catalog_item_type_permissions: Vec<IdPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub vdi_pool_permissions: Vec<IdPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub workflow_permissions: Vec<IdPermission>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub task_permissions: Vec<IdPermission>,
}

fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn unexpected(value: &serde_json::Value) -> Unexpected<'_> {
    match value {
        serde_json::Value::Null => Unexpected::Unit,
        serde_json::Value::Bool(b) => Unexpected::Bool(*b),
        serde_json::Value::Number(_) => Unexpected::Other("number"),
        serde_json::Value::String(s) => Unexpected::Str(s),
        serde_json::Value::Array(_) => Unexpected::Seq,
        serde_json::Value::Object(_) => Unexpected::Map,
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PermissionDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from its JSON text
    ///
    /// Only a JSON object is a document. The derived struct deserializer would
    /// also fill fields by position from an array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(serde::de::Error::invalid_type(
                unexpected(&value),
                &"a permission document object",
            ));
        }
        serde_json::from_value(value)
    }

    /// Serialize as JSON with 2-space indentation
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Value of a default scalar; empty strings read as unset
    pub fn default_value(&self, field: DefaultField) -> Option<&str> {
        self.default_slot(field)
            .as_deref()
            .filter(|value| !value.is_empty())
    }

    pub fn set_default(&mut self, field: DefaultField, value: Option<String>) {
        *self.default_slot_mut(field) = value.filter(|v| !v.is_empty());
    }

    pub fn with_default(mut self, field: DefaultField, value: impl Into<String>) -> Self {
        self.set_default(field, Some(value.into()));
        self
    }

    pub fn with_id_permission(
        mut self,
        category: Category,
        id: i64,
        access: impl Into<String>,
    ) -> Self {
        if let CollectionMut::Id(entries) = self.collection_mut(category) {
            entries.push(IdPermission::new(id, access));
        }
        self
    }

    pub fn with_code_permission(
        mut self,
        category: Category,
        code: impl Into<String>,
        access: impl Into<String>,
    ) -> Self {
        if let CollectionMut::Code(entries) = self.collection_mut(category) {
            entries.push(CodePermission::new(code, access));
        }
        self
    }

    pub fn collection(&self, category: Category) -> Collection<'_> {
        match category {
            Category::Feature => Collection::Code(&self.feature_permissions),
            Category::Group => Collection::Id(&self.group_permissions),
            Category::InstanceType => Collection::Id(&self.instance_type_permissions),
            Category::Blueprint => Collection::Id(&self.blueprint_permissions),
            Category::ReportType => Collection::Code(&self.report_type_permissions),
            Category::Persona => Collection::Code(&self.persona_permissions),
            Category::CatalogItemType => Collection::Id(&self.catalog_item_type_permissions),
            Category::VdiPool => Collection::Id(&self.vdi_pool_permissions),
            Category::Workflow => Collection::Id(&self.workflow_permissions),
            Category::Task => Collection::Id(&self.task_permissions),
        }
    }

    pub fn collection_mut(&mut self, category: Category) -> CollectionMut<'_> {
        match category {
            Category::Feature => CollectionMut::Code(&mut self.feature_permissions),
            Category::Group => CollectionMut::Id(&mut self.group_permissions),
            Category::InstanceType => CollectionMut::Id(&mut self.instance_type_permissions),
            Category::Blueprint => CollectionMut::Id(&mut self.blueprint_permissions),
            Category::ReportType => CollectionMut::Code(&mut self.report_type_permissions),
            Category::Persona => CollectionMut::Code(&mut self.persona_permissions),
            Category::CatalogItemType => {
                CollectionMut::Id(&mut self.catalog_item_type_permissions)
            }
            Category::VdiPool => CollectionMut::Id(&mut self.vdi_pool_permissions),
            Category::Workflow => CollectionMut::Id(&mut self.workflow_permissions),
            Category::Task => CollectionMut::Id(&mut self.task_permissions),
        }
    }

    pub fn entry_count(&self, category: Category) -> usize {
        self.collection(category).len()
    }

    /// Returns true if no default is set and every collection is empty
    pub fn is_empty(&self) -> bool {
        DefaultField::ALL
            .into_iter()
            .all(|f| self.default_value(f).is_none())
            && Category::ALL
                .into_iter()
                .all(|c| self.collection(c).is_empty())
    }

    fn default_slot(&self, field: DefaultField) -> &Option<String> {
        match field {
            DefaultField::Group => &self.default_group_permission,
            DefaultField::InstanceType => &self.default_instance_type_permission,
            DefaultField::Blueprint => &self.default_blueprint_permission,
            DefaultField::ReportType => &self.default_report_type_permission,
            DefaultField::Persona => &self.default_persona,
            DefaultField::CatalogItemType => &self.default_catalog_item_type_permission,
            DefaultField::VdiPool => &self.default_vdi_pool_permission,
            DefaultField::Workflow => &self.default_workflow_permission,
            DefaultField::Task => &self.default_task_permission,
        }
    }

    fn default_slot_mut(&mut self, field: DefaultField) -> &mut Option<String> {
        match field {
            DefaultField::Group => &mut self.default_group_permission,
            DefaultField::InstanceType => &mut self.default_instance_type_permission,
            DefaultField::Blueprint => &mut self.default_blueprint_permission,
            DefaultField::ReportType => &mut self.default_report_type_permission,
            DefaultField::Persona => &mut self.default_persona,
            DefaultField::CatalogItemType => &mut self.default_catalog_item_type_permission,
            DefaultField::VdiPool => &mut self.default_vdi_pool_permission,
            DefaultField::Workflow => &mut self.default_workflow_permission,
            DefaultField::Task => &mut self.default_task_permission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_document() {
        let doc = PermissionDocument::from_json(
            r#"{"default_group_permission":"none","group_permissions":[{"id":5,"access":"none"}]}"#,
        )
        .unwrap();

        assert_eq!(doc.default_value(DefaultField::Group), Some("none"));
        assert_eq!(doc.group_permissions, vec![IdPermission::new(5, "none")]);
        assert_eq!(doc.entry_count(Category::Feature), 0);
    }

    #[test]
    fn empty_fields_are_omitted() {
        let mut doc = PermissionDocument::new()
            .with_default(DefaultField::Task, "full")
            .with_code_permission(Category::Feature, "admin-cm", "full");
        doc.default_persona = Some(String::new());

        assert_eq!(
            doc.to_json().unwrap(),
            r#"{"default_task_permission":"full","feature_permissions":[{"code":"admin-cm","access":"full"}]}"#
        );
    }

    #[test]
    fn entries_always_carry_key_and_access() {
        let doc = PermissionDocument::new().with_id_permission(Category::Group, 0, "");
        assert_eq!(
            doc.to_json().unwrap(),
            r#"{"group_permissions":[{"id":0,"access":""}]}"#
        );
    }

    #[test]
    fn pretty_output_uses_two_space_indent() {
        let doc = PermissionDocument::new().with_default(DefaultField::Group, "read");
        assert_eq!(
            doc.to_json_pretty().unwrap(),
            "{\n  \"default_group_permission\": \"read\"\n}"
        );
    }

    #[test]
    fn null_collections_read_as_empty() {
        let doc =
            PermissionDocument::from_json(r#"{"task_permissions":null,"default_persona":null}"#)
                .unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(PermissionDocument::from_json("[]").is_err());
        assert!(PermissionDocument::from_json(r#"{"group_permissions":[{"id":"x"}]}"#).is_err());
        assert!(PermissionDocument::from_json(r#"{"default_task_permission":3}"#).is_err());
        assert!(PermissionDocument::from_json("not json").is_err());
    }

    #[test]
    fn arrays_are_not_documents() {
        assert!(PermissionDocument::from_json(r#"["full"]"#).is_err());
        assert!(PermissionDocument::from_json(r#"["full", null, "read"]"#).is_err());

        let error = PermissionDocument::from_json("[]").unwrap_err();
        assert!(error.to_string().contains("a permission document object"));
        assert!(PermissionDocument::from_json("null").is_err());
        assert!(PermissionDocument::from_json(r#""text""#).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc = PermissionDocument::from_json(r#"{"cloud_permissions":[]}"#).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn set_default_treats_empty_as_unset() {
        let mut doc = PermissionDocument::new().with_default(DefaultField::Workflow, "full");
        doc.set_default(DefaultField::Workflow, Some(String::new()));
        assert_eq!(doc.default_value(DefaultField::Workflow), None);
        assert!(doc.is_empty());
    }

    #[test]
    fn collection_views_match_category_key_kind() {
        let doc = PermissionDocument::new();
        for category in Category::ALL {
            assert_eq!(doc.collection(category).key_kind(), category.key_kind());
        }
    }

    #[test]
    fn builder_ignores_mismatched_key_kind() {
        let doc = PermissionDocument::new()
            .with_id_permission(Category::Feature, 1, "full")
            .with_code_permission(Category::Group, "x", "full");
        assert!(doc.is_empty());
    }
}
