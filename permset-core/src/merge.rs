//! Merge - Fold override documents onto a base permission document
//!
//! Overrides are applied strictly in list order, so later overrides win over
//! earlier ones and over the base. Each application is a pure step from one
//! accumulated document to the next.
//!
//! Per default scalar, a non-empty override value replaces the accumulated one.
//! Per collection, the steps are:
//!
//! 1. accumulated entries whose key appears in the override take its access
//! 2. every override entry is appended
//! 3. duplicates are removed according to the [`DedupPolicy`]
//! 4. the collection is sorted ascending by key

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::category::{Category, DefaultField};
use crate::document::{PermissionDocument, PermissionEntry};
use crate::error::{MergeError, MergeResult};
use crate::validate::validate_document;

/// How duplicate entries are collapsed after an override is appended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Drop entries equal in both key and access, keeping the first.
    ///
    /// A key may survive twice when its access values differ.
    WholeEntry,
    /// Keep exactly one entry per key: the last one in accumulate-then-append order
    #[default]
    LastWriteWins,
}

/// Counts reported for one application of an override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub defaults_replaced: usize,
    pub entries_overridden: usize,
    pub entries_appended: usize,
}

/// Configurable merge engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Merger {
    dedup: DedupPolicy,
    validate: bool,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    /// Validate enum values of the base and every override before merging
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn dedup(&self) -> DedupPolicy {
        self.dedup
    }

    /// Merge typed documents
    pub fn merge(
        &self,
        base: &PermissionDocument,
        overrides: &[PermissionDocument],
    ) -> MergeResult<PermissionDocument> {
        if self.validate {
            validate_document(base).map_err(first_error)?;
            for (index, doc) in overrides.iter().enumerate() {
                validate_document(doc).map_err(|errors| MergeError::InvalidOverride {
                    index,
                    source: Box::new(first_error(errors)),
                })?;
            }
        }

        let mut merged = canonicalize(base.clone(), self.dedup);
        for (index, doc) in overrides.iter().enumerate() {
            let (next, stats) = apply_override(merged, doc, self.dedup);
            debug!(
                "Applied override {}: {} defaults replaced, {} entries overridden, {} entries appended",
                index, stats.defaults_replaced, stats.entries_overridden, stats.entries_appended
            );
            merged = next;
        }

        if self.dedup == DedupPolicy::WholeEntry {
            warn_conflicting_keys(&merged);
        }

        Ok(merged)
    }

    /// Parse, merge and serialize documents given as JSON text
    ///
    /// Every override is parsed before any merging happens, so a malformed
    /// override never yields a partially merged result.
    pub fn merge_json<S: AsRef<str>>(&self, base: &str, overrides: &[S]) -> MergeResult<String> {
        let base = PermissionDocument::from_json(base).map_err(MergeError::MalformedBase)?;
        let overrides = parse_overrides(overrides)?;

        let merged = self.merge(&base, &overrides)?;
        merged.to_json_pretty().map_err(MergeError::Serialization)
    }
}

/// Merge typed documents with the default merger
pub fn merge(
    base: &PermissionDocument,
    overrides: &[PermissionDocument],
) -> MergeResult<PermissionDocument> {
    Merger::new().merge(base, overrides)
}

/// Merge JSON documents with the default merger
pub fn merge_json<S: AsRef<str>>(base: &str, overrides: &[S]) -> MergeResult<String> {
    Merger::new().merge_json(base, overrides)
}

/// Parse override documents, failing on the first malformed one
pub fn parse_overrides<S: AsRef<str>>(overrides: &[S]) -> MergeResult<Vec<PermissionDocument>> {
    overrides
        .iter()
        .enumerate()
        .map(|(index, json)| {
            PermissionDocument::from_json(json.as_ref())
                .map_err(|cause| MergeError::MalformedOverride { index, cause })
        })
        .collect()
}

/// Deduplicate and sort every collection and drop empty defaults
pub fn canonicalize(doc: PermissionDocument, dedup: DedupPolicy) -> PermissionDocument {
    apply_override(doc, &PermissionDocument::default(), dedup).0
}

/// Apply a single override to an accumulated document
pub fn apply_override(
    mut acc: PermissionDocument,
    over: &PermissionDocument,
    dedup: DedupPolicy,
) -> (PermissionDocument, ApplyStats) {
    let mut stats = ApplyStats::default();

    for field in DefaultField::ALL {
        match over.default_value(field) {
            Some(value) => {
                acc.set_default(field, Some(value.to_string()));
                stats.defaults_replaced += 1;
            }
            None => {
                // Normalizes an empty accumulated value to unset
                let current = acc.default_value(field).map(str::to_string);
                acc.set_default(field, current);
            }
        }
    }

    for category in Category::ALL {
        let (overridden, appended) = merge_category(&mut acc, over, category, dedup);
        if overridden + appended > 0 {
            trace!(
                "{}: {} overridden, {} appended, {} total",
                category.collection_field(),
                overridden,
                appended,
                acc.entry_count(category)
            );
        }
        stats.entries_overridden += overridden;
        stats.entries_appended += appended;
    }

    (acc, stats)
}

fn merge_category(
    acc: &mut PermissionDocument,
    over: &PermissionDocument,
    category: Category,
    dedup: DedupPolicy,
) -> (usize, usize) {
    match category {
        Category::Feature => {
            merge_entries(&mut acc.feature_permissions, &over.feature_permissions, dedup)
        }
        Category::Group => merge_entries(&mut acc.group_permissions, &over.group_permissions, dedup),
        Category::InstanceType => merge_entries(
            &mut acc.instance_type_permissions,
            &over.instance_type_permissions,
            dedup,
        ),
        Category::Blueprint => merge_entries(
            &mut acc.blueprint_permissions,
            &over.blueprint_permissions,
            dedup,
        ),
        Category::ReportType => merge_entries(
            &mut acc.report_type_permissions,
            &over.report_type_permissions,
            dedup,
        ),
        Category::Persona => {
            merge_entries(&mut acc.persona_permissions, &over.persona_permissions, dedup)
        }
        Category::CatalogItemType => merge_entries(
            &mut acc.catalog_item_type_permissions,
            &over.catalog_item_type_permissions,
            dedup,
        ),
        Category::VdiPool => {
            merge_entries(&mut acc.vdi_pool_permissions, &over.vdi_pool_permissions, dedup)
        }
        Category::Workflow => {
            merge_entries(&mut acc.workflow_permissions, &over.workflow_permissions, dedup)
        }
        Category::Task => merge_entries(&mut acc.task_permissions, &over.task_permissions, dedup),
    }
}

/// Merge one collection in place; returns (overridden, appended) counts
fn merge_entries<E: PermissionEntry>(
    acc: &mut Vec<E>,
    over: &[E],
    dedup: DedupPolicy,
) -> (usize, usize) {
    let mut overridden = 0;
    for entry in acc.iter_mut() {
        // Last matching override entry wins
        if let Some(replacement) = over.iter().rev().find(|o| o.key() == entry.key()) {
            entry.set_access(replacement.access().to_string());
            overridden += 1;
        }
    }

    acc.extend_from_slice(over);

    match dedup {
        DedupPolicy::WholeEntry => dedup_whole_entries(acc),
        DedupPolicy::LastWriteWins => dedup_keep_last_per_key(acc),
    }

    // Stable, so same-key entries keep their relative order
    acc.sort_by(|a, b| a.key().cmp(b.key()));

    (overridden, over.len())
}

fn dedup_whole_entries<E: PermissionEntry>(entries: &mut Vec<E>) {
    let mut unique: Vec<E> = Vec::with_capacity(entries.len());
    for entry in entries.drain(..) {
        if !unique.contains(&entry) {
            unique.push(entry);
        }
    }
    *entries = unique;
}

fn dedup_keep_last_per_key<E: PermissionEntry>(entries: &mut Vec<E>) {
    let mut last_index: HashMap<E::Key, usize> = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        last_index.insert(entry.key().clone(), i);
    }

    let mut i = 0;
    entries.retain(|entry| {
        let keep = last_index.get(entry.key()) == Some(&i);
        i += 1;
        keep
    });
}

fn warn_conflicting_keys(doc: &PermissionDocument) {
    for category in Category::ALL {
        let pairs = doc.collection(category).pairs();
        for window in pairs.windows(2) {
            if window[0].0 == window[1].0 {
                warn!(
                    "{} holds key {} more than once with different access values ({}, {})",
                    category.collection_field(),
                    window[0].0,
                    window[0].1,
                    window[1].1
                );
            }
        }
    }
}

fn first_error(mut errors: Vec<MergeError>) -> MergeError {
    // validate_document only returns Err with at least one error
    errors.swap_remove(0)
}
