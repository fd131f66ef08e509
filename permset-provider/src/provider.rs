//! Provider - Resource types exposed to the plugin layer
//!
//! The plugin layer owns transport and state storage. This module defines the
//! error type shared by all resource types and the registry of types the
//! provider serves.

use permset_core::{MergeError, Merger};

use crate::permission_set::PermissionSetDataSource;
use crate::resource::ResourceId;
use crate::schema::{ResourceSchema, TypeError};
use crate::tenant_role::TenantRoleResource;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Schema validation failures, one line per error
    pub fn invalid_attributes(errors: &[TypeError]) -> Self {
        let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        Self::new(format!("Invalid configuration:\n  {}", lines.join("\n  ")))
    }
}

impl From<MergeError> for ProviderError {
    fn from(error: MergeError) -> Self {
        Self::new(error.to_string()).with_cause(error)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Definition of resource types that the provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "tenant_role")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;

    /// Returns true for read-only data sources
    fn is_data_source(&self) -> bool {
        false
    }
}

/// The permission set provider
#[derive(Debug, Clone, Copy, Default)]
pub struct PermsetProvider {
    merger: Merger,
}

impl PermsetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom merger for every resource type
    pub fn with_merger(mut self, merger: Merger) -> Self {
        self.merger = merger;
        self
    }

    pub fn name(&self) -> &'static str {
        "permset"
    }

    pub fn permission_set(&self) -> PermissionSetDataSource {
        PermissionSetDataSource::new(self.merger)
    }

    pub fn tenant_role(&self) -> TenantRoleResource {
        TenantRoleResource::new(self.merger)
    }

    /// List of resource types this provider can handle
    pub fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(self.permission_set()), Box::new(self.tenant_role())]
    }

    /// Find a resource type or data source by name
    pub fn resource_type(&self, name: &str) -> Option<Box<dyn ResourceType>> {
        self.resource_types().into_iter().find(|t| t.name() == name)
    }

    /// Find the schema of a resource type by name
    pub fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.resource_type(resource_type).map(|t| t.schema())
    }
}
