//! Category - The governed permission domains
//!
//! Every permission collection in a document belongs to one category. The
//! category decides how its entries are keyed (numeric ID or string code),
//! which JSON field holds the collection, and which access values are legal.

use std::fmt;

/// How entries of a category are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Numeric identifier, serialized as `id`
    Id,
    /// String code, serialized as `code`
    Code,
}

impl KeyKind {
    /// JSON field name carrying the key inside an entry
    pub fn field(&self) -> &'static str {
        match self {
            KeyKind::Id => "id",
            KeyKind::Code => "code",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

const FEATURE_ACCESS: &[&str] = &[
    "none",
    "read",
    "user",
    "full",
    "yes",
    "no",
    "view",
    "rolemappings",
    "listfiles",
    "group",
    "full_decryption",
];
const GROUP_ACCESS: &[&str] = &["default", "none", "read", "full"];
const PERSONA_ACCESS: &[&str] = &["none", "full"];
const RESOURCE_ACCESS: &[&str] = &["default", "none", "full"];

/// A permission collection category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Feature,
    Group,
    InstanceType,
    Blueprint,
    ReportType,
    Persona,
    CatalogItemType,
    VdiPool,
    Workflow,
    Task,
}

impl Category {
    /// All categories in wire order
    pub const ALL: [Category; 10] = [
        Category::Feature,
        Category::Group,
        Category::InstanceType,
        Category::Blueprint,
        Category::ReportType,
        Category::Persona,
        Category::CatalogItemType,
        Category::VdiPool,
        Category::Workflow,
        Category::Task,
    ];

    /// Snake-case name of the category (e.g., "instance_type")
    pub fn name(&self) -> &'static str {
        match self {
            Category::Feature => "feature",
            Category::Group => "group",
            Category::InstanceType => "instance_type",
            Category::Blueprint => "blueprint",
            Category::ReportType => "report_type",
            Category::Persona => "persona",
            Category::CatalogItemType => "catalog_item_type",
            Category::VdiPool => "vdi_pool",
            Category::Workflow => "workflow",
            Category::Task => "task",
        }
    }

    /// JSON field holding the collection (e.g., "group_permissions")
    pub fn collection_field(&self) -> &'static str {
        match self {
            Category::Feature => "feature_permissions",
            Category::Group => "group_permissions",
            Category::InstanceType => "instance_type_permissions",
            Category::Blueprint => "blueprint_permissions",
            Category::ReportType => "report_type_permissions",
            Category::Persona => "persona_permissions",
            Category::CatalogItemType => "catalog_item_type_permissions",
            Category::VdiPool => "vdi_pool_permissions",
            Category::Workflow => "workflow_permissions",
            Category::Task => "task_permissions",
        }
    }

    pub fn key_kind(&self) -> KeyKind {
        match self {
            Category::Feature | Category::ReportType | Category::Persona => KeyKind::Code,
            _ => KeyKind::Id,
        }
    }

    /// Valid access values for entries of this category
    pub fn access_values(&self) -> &'static [&'static str] {
        match self {
            Category::Feature => FEATURE_ACCESS,
            Category::Group => GROUP_ACCESS,
            Category::Persona => PERSONA_ACCESS,
            _ => RESOURCE_ACCESS,
        }
    }

    pub fn is_valid_access(&self, access: &str) -> bool {
        self.access_values().contains(&access)
    }

    /// The default scalar governing this category, if it has one
    pub fn default_field(&self) -> Option<DefaultField> {
        DefaultField::ALL.into_iter().find(|d| d.category() == *self)
    }

    /// Look up a category by its snake-case name or collection field
    pub fn from_name(name: &str) -> Option<Category> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name || c.collection_field() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A default permission scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefaultField {
    Group,
    InstanceType,
    Blueprint,
    ReportType,
    Persona,
    CatalogItemType,
    VdiPool,
    Workflow,
    Task,
}

impl DefaultField {
    /// All default fields in wire order
    pub const ALL: [DefaultField; 9] = [
        DefaultField::Group,
        DefaultField::InstanceType,
        DefaultField::Blueprint,
        DefaultField::ReportType,
        DefaultField::Persona,
        DefaultField::CatalogItemType,
        DefaultField::VdiPool,
        DefaultField::Workflow,
        DefaultField::Task,
    ];

    pub fn json_field(&self) -> &'static str {
        match self {
            DefaultField::Group => "default_group_permission",
            DefaultField::InstanceType => "default_instance_type_permission",
            DefaultField::Blueprint => "default_blueprint_permission",
            DefaultField::ReportType => "default_report_type_permission",
            DefaultField::Persona => "default_persona",
            DefaultField::CatalogItemType => "default_catalog_item_type_permission",
            DefaultField::VdiPool => "default_vdi_pool_permission",
            DefaultField::Workflow => "default_workflow_permission",
            DefaultField::Task => "default_task_permission",
        }
    }

    /// Valid values for this default
    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            DefaultField::Group => &["none", "read", "full"],
            DefaultField::Persona => &["standard", "serviceCatalog", "vdi"],
            _ => &["none", "full"],
        }
    }

    pub fn is_valid(&self, value: &str) -> bool {
        self.allowed_values().contains(&value)
    }

    pub fn category(&self) -> Category {
        match self {
            DefaultField::Group => Category::Group,
            DefaultField::InstanceType => Category::InstanceType,
            DefaultField::Blueprint => Category::Blueprint,
            DefaultField::ReportType => Category::ReportType,
            DefaultField::Persona => Category::Persona,
            DefaultField::CatalogItemType => Category::CatalogItemType,
            DefaultField::VdiPool => Category::VdiPool,
            DefaultField::Workflow => Category::Workflow,
            DefaultField::Task => Category::Task,
        }
    }

    pub fn from_json_field(field: &str) -> Option<DefaultField> {
        Self::ALL.into_iter().find(|d| d.json_field() == field)
    }
}

impl fmt::Display for DefaultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_field())
    }
}
