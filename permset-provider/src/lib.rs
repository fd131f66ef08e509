//! Permset Provider
//!
//! Provider-side handling of permission sets: attribute schemas, the
//! `permission_set` data source and planning for the `tenant_role` resource.
//! Transport to the platform and state storage belong to the plugin layer.

pub mod differ;
pub mod permission_set;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod tenant_role;

pub use differ::{PermissionDiff, diff_documents, diff_permission_sets};
pub use permission_set::PermissionSetDataSource;
pub use provider::{PermsetProvider, ProviderError, ProviderResult, ResourceType};
pub use resource::{Resource, ResourceId, State, Value, ValueError};
pub use tenant_role::TenantRoleResource;
