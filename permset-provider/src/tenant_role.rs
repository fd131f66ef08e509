//! Tenant role resource
//!
//! A tenant role carries a base `permission_set` document plus optional
//! `override_permission_sets`. The provider sends the merged document to the
//! platform and compares it semantically against the stored one when planning.

use log::debug;
use permset_core::{Merger, PermissionDocument};
use serde_json::json;

use crate::differ::{PermissionDiff, diff_documents};
use crate::permission_set::{OVERRIDE_PERMISSION_SETS, override_documents};
use crate::provider::{ProviderError, ProviderResult, ResourceType};
use crate::resource::{Resource, State, Value};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const MULTITENANT: &str = "multitenant";
pub const PERMISSION_SET: &str = "permission_set";

/// `tenant_role` resource
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantRoleResource {
    merger: Merger,
}

impl TenantRoleResource {
    pub const NAME: &'static str = "tenant_role";

    pub fn new(merger: Merger) -> Self {
        Self { merger }
    }

    /// Merged permission document for the declared role
    pub fn desired_document(&self, resource: &Resource) -> ProviderResult<PermissionDocument> {
        self.schema()
            .validate(&resource.attributes)
            .map_err(|errors| {
                ProviderError::invalid_attributes(&errors).for_resource(resource.id.clone())
            })?;

        let base = match resource.get_string(PERMISSION_SET) {
            Some(json) => PermissionDocument::from_json(json).map_err(|e| {
                ProviderError::new("permission_set is not a valid permission document")
                    .for_resource(resource.id.clone())
                    .with_cause(e)
            })?,
            None => PermissionDocument::new(),
        };
        let overrides = override_documents(&resource.attributes)
            .map_err(|e| e.for_resource(resource.id.clone()))?;

        self.merger
            .merge(&base, &overrides)
            .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))
    }

    /// Merged permission set as pretty JSON
    pub fn desired_permission_set(&self, resource: &Resource) -> ProviderResult<String> {
        self.desired_document(resource)?.to_json_pretty().map_err(|e| {
            ProviderError::new("Failed to serialize permission set")
                .for_resource(resource.id.clone())
                .with_cause(e)
        })
    }

    /// Request body for creating or updating the role on the platform
    pub fn role_payload(&self, resource: &Resource) -> ProviderResult<serde_json::Value> {
        let permissions = serde_json::to_value(self.desired_document(resource)?).map_err(|e| {
            ProviderError::new("Failed to serialize permission set")
                .for_resource(resource.id.clone())
                .with_cause(e)
        })?;

        let mut role = serde_json::Map::new();
        for key in [NAME, DESCRIPTION, MULTITENANT] {
            if let Some(value) = resource.attributes.get(key) {
                role.insert(key.to_string(), value.to_json());
            }
        }
        role.insert("permissions".to_string(), permissions);

        Ok(json!({ "role": role }))
    }

    /// State recorded after a successful apply
    pub fn applied_state(&self, resource: &Resource) -> ProviderResult<State> {
        let permission_set = self.desired_permission_set(resource)?;
        let mut attributes = resource.attributes.clone();
        attributes.insert(PERMISSION_SET.to_string(), Value::String(permission_set));
        attributes.remove(OVERRIDE_PERMISSION_SETS);
        Ok(State::new(resource.id.clone(), attributes))
    }

    /// Compare the stored permission set with the declared one
    ///
    /// A missing stored permission set compares as an empty document.
    pub fn plan(&self, resource: &Resource, current: &State) -> ProviderResult<PermissionDiff> {
        let desired = self.desired_document(resource)?;
        let stored = match current.get_string(PERMISSION_SET) {
            Some(json) => PermissionDocument::from_json(json).map_err(|e| {
                ProviderError::new("Stored permission_set is not a valid permission document")
                    .for_resource(current.id.clone())
                    .with_cause(e)
            })?,
            None => PermissionDocument::new(),
        };

        let diff = diff_documents(&stored, &desired);
        if let PermissionDiff::Update { changed_fields } = &diff {
            debug!("{} changes: {}", resource.id, changed_fields.join(", "));
        }
        Ok(diff)
    }
}

impl ResourceType for TenantRoleResource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(Self::NAME)
            .with_description("Tenant role with a merged permission set")
            .attribute(
                AttributeSchema::new(NAME, types::non_empty_string())
                    .required()
                    .with_description("Role name"),
            )
            .attribute(AttributeSchema::new(DESCRIPTION, AttributeType::String))
            .attribute(
                AttributeSchema::new(MULTITENANT, AttributeType::Bool)
                    .with_description("Whether the role is copied to every tenant"),
            )
            .attribute(
                AttributeSchema::new(PERMISSION_SET, types::permission_set_json())
                    .with_description("Base permission set document"),
            )
            .attribute(
                AttributeSchema::new(
                    OVERRIDE_PERMISSION_SETS,
                    AttributeType::List(Box::new(types::permission_set_json())),
                )
                .with_description("Permission set documents applied in order, last wins"),
            )
    }
}
