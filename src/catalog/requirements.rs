//! Module descriptors and the requirement catalog.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{CatalogError, Result};
use crate::types::ModuleType;

/// A selectable module type and what it needs.
///
/// Display metadata (`name`, `category`, `description`) is carried for the
/// presentation layer; only `requirements` affects validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: ModuleType,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Module types that must be provisioned before this one.
    #[serde(default)]
    pub requirements: BTreeSet<ModuleType>,

    /// Account-level context (subscription, region, ...) the module needs.
    /// Not module types; never validated against the selection.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub context_requirements: BTreeSet<String>,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<ModuleType>, name: impl Into<String>) -> Self {
        ModuleDescriptor {
            id: id.into(),
            name: name.into(),
            category: None,
            description: None,
            requirements: BTreeSet::new(),
            context_requirements: BTreeSet::new(),
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn requires(mut self, module_type: impl Into<ModuleType>) -> Self {
        self.requirements.insert(module_type.into());
        self
    }

    pub fn needs_context(mut self, context: impl Into<String>) -> Self {
        self.context_requirements.insert(context.into());
        self
    }
}

/// The requirement declarations for every known module type.
///
/// The catalog is the single source of canonical type identifiers: every
/// requirement names a declared type, and each type is declared once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ModuleDescriptor>", into = "Vec<ModuleDescriptor>")]
pub struct RequirementCatalog {
    modules: BTreeMap<ModuleType, ModuleDescriptor>,
}

impl RequirementCatalog {
    /// Builds a catalog, rejecting duplicate ids and requirements on
    /// undeclared types.
    pub fn new(descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Result<Self> {
        let mut modules = BTreeMap::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            if modules.insert(id.clone(), descriptor).is_some() {
                return Err(CatalogError::DuplicateModule(id));
            }
        }

        for descriptor in modules.values() {
            if let Some(requirement) = descriptor
                .requirements
                .iter()
                .find(|r| !modules.contains_key(*r))
            {
                return Err(CatalogError::UnknownRequirement {
                    module_type: descriptor.id.clone(),
                    requirement: requirement.clone(),
                });
            }
        }

        Ok(RequirementCatalog { modules })
    }

    /// Builds a bare catalog from `type -> requirements` pairs.
    ///
    /// Types that only appear as requirements are declared with no
    /// requirements of their own. Repeated types merge their requirements.
    pub fn from_requirements<I, T, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, R)>,
        T: Into<ModuleType>,
        R: IntoIterator,
        R::Item: Into<ModuleType>,
    {
        let mut modules: BTreeMap<ModuleType, ModuleDescriptor> = BTreeMap::new();
        for (module_type, requirements) in entries {
            let module_type = module_type.into();
            let requirements: Vec<ModuleType> = requirements.into_iter().map(Into::into).collect();
            for requirement in &requirements {
                modules
                    .entry(requirement.clone())
                    .or_insert_with(|| ModuleDescriptor::new(requirement.clone(), requirement.as_str()));
            }
            modules
                .entry(module_type.clone())
                .or_insert_with(|| ModuleDescriptor::new(module_type.clone(), module_type.as_str()))
                .requirements
                .extend(requirements);
        }
        RequirementCatalog { modules }
    }

    /// Parses and validates a JSON array of module descriptors.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let descriptors: Vec<ModuleDescriptor> = serde_json::from_str(json)?;
        Self::new(descriptors)
    }

    /// Prerequisite types of `module_type`, or `None` if it is not declared.
    pub fn requirements_of(&self, module_type: &ModuleType) -> Option<&BTreeSet<ModuleType>> {
        self.modules.get(module_type).map(|d| &d.requirements)
    }

    pub fn descriptor(&self, module_type: &ModuleType) -> Option<&ModuleDescriptor> {
        self.modules.get(module_type)
    }

    pub fn contains(&self, module_type: &ModuleType) -> bool {
        self.modules.contains_key(module_type)
    }

    /// Descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl TryFrom<Vec<ModuleDescriptor>> for RequirementCatalog {
    type Error = CatalogError;

    fn try_from(descriptors: Vec<ModuleDescriptor>) -> Result<Self> {
        Self::new(descriptors)
    }
}

impl From<RequirementCatalog> for Vec<ModuleDescriptor> {
    fn from(catalog: RequirementCatalog) -> Self {
        catalog.modules.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mt(s: &str) -> ModuleType {
        ModuleType::from(s)
    }

    #[test]
    fn new_rejects_duplicate_ids() {
        let err = RequirementCatalog::new([
            ModuleDescriptor::new("vnet", "Virtual Network"),
            ModuleDescriptor::new("vnet", "VNet again"),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateModule(id) if id == mt("vnet")));
    }

    #[test]
    fn new_rejects_requirement_on_undeclared_type() {
        // A generic "storage" alias is not a declared type.
        let err = RequirementCatalog::new([
            ModuleDescriptor::new("storage_account", "Storage Account"),
            ModuleDescriptor::new("blob_storage", "Blob Container").requires("storage"),
        ])
        .unwrap_err();

        match err {
            CatalogError::UnknownRequirement {
                module_type,
                requirement,
            } => {
                assert_eq!(module_type, mt("blob_storage"));
                assert_eq!(requirement, mt("storage"));
            }
            other => panic!("Expected UnknownRequirement, got {:?}", other),
        }
    }

    #[test]
    fn from_requirements_declares_referenced_types() {
        let catalog = RequirementCatalog::from_requirements([("vm", ["vnet"])]);

        assert!(catalog.contains(&mt("vnet")));
        assert!(catalog.requirements_of(&mt("vnet")).unwrap().is_empty());
        assert_eq!(
            catalog.requirements_of(&mt("vm")).unwrap(),
            &BTreeSet::from([mt("vnet")])
        );
    }

    #[test]
    fn from_requirements_merges_repeated_types() {
        let catalog = RequirementCatalog::from_requirements([
            ("app", vec!["db"]),
            ("app", vec!["cache"]),
        ]);
        assert_eq!(catalog.requirements_of(&mt("app")).unwrap().len(), 2);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn context_requirements_are_metadata_only() {
        let catalog = RequirementCatalog::new([ModuleDescriptor::new("vnet", "Virtual Network")
            .needs_context("Subscription")
            .needs_context("Region")])
        .unwrap();

        let vnet = catalog.descriptor(&mt("vnet")).unwrap();
        assert_eq!(vnet.context_requirements.len(), 2);
        assert!(catalog.requirements_of(&mt("vnet")).unwrap().is_empty());
    }

    #[test]
    fn parses_json_descriptor_list() {
        let catalog = RequirementCatalog::from_json_str(
            r#"[
                {"id": "vnet", "name": "Virtual Network", "context_requirements": ["Subscription"]},
                {"id": "aks", "name": "AKS Cluster", "category": "compute", "requirements": ["vnet"]}
            ]"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.descriptor(&mt("aks")).and_then(|d| d.category.as_deref()),
            Some("compute")
        );
    }

    #[test]
    fn json_with_dangling_requirement_is_rejected() {
        let err = RequirementCatalog::from_json_str(r#"[{"id": "aks", "requirements": ["vnet"]}]"#)
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownRequirement { .. }));
    }

    #[test]
    fn serde_round_trip() {
        let catalog = RequirementCatalog::from_requirements([("vm", ["vnet"])]);
        let json = serde_json::to_string(&catalog).unwrap();
        let back: RequirementCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, catalog);
    }
}
