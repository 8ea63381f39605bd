//! The operator's selection and the plan computed from it.

use serde::{Deserialize, Serialize};

use crate::types::{InstanceId, ModuleType};

/// One placed module instance, tagged with its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedModule {
    pub instance: InstanceId,
    pub module_type: ModuleType,
}

impl SelectedModule {
    pub fn new(instance: InstanceId, module_type: impl Into<ModuleType>) -> Self {
        SelectedModule {
            instance,
            module_type: module_type.into(),
        }
    }
}

/// Module instances the operator intends to provision, in the order they
/// were selected.
///
/// Selection order is significant: it breaks ties in the provisioning order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SelectedModule>", into = "Vec<SelectedModule>")]
pub struct SelectionSet {
    modules: Vec<SelectedModule>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instance. Returns false if the instance id is already selected.
    pub fn add(&mut self, instance: InstanceId, module_type: ModuleType) -> bool {
        if self.contains(instance) {
            return false;
        }
        self.modules.push(SelectedModule {
            instance,
            module_type,
        });
        true
    }

    /// Removes an instance, keeping the relative order of the rest.
    pub fn remove(&mut self, instance: InstanceId) -> Option<SelectedModule> {
        let pos = self.modules.iter().position(|m| m.instance == instance)?;
        Some(self.modules.remove(pos))
    }

    pub fn contains(&self, instance: InstanceId) -> bool {
        self.modules.iter().any(|m| m.instance == instance)
    }

    pub fn get(&self, instance: InstanceId) -> Option<&SelectedModule> {
        self.modules.iter().find(|m| m.instance == instance)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedModule> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl FromIterator<SelectedModule> for SelectionSet {
    /// Collects in iteration order, skipping repeated instance ids.
    fn from_iter<I: IntoIterator<Item = SelectedModule>>(iter: I) -> Self {
        let mut set = SelectionSet::new();
        for module in iter {
            set.add(module.instance, module.module_type);
        }
        set
    }
}

impl From<Vec<SelectedModule>> for SelectionSet {
    fn from(modules: Vec<SelectedModule>) -> Self {
        modules.into_iter().collect()
    }
}

impl From<SelectionSet> for Vec<SelectedModule> {
    fn from(set: SelectionSet) -> Self {
        set.modules
    }
}

/// A provisioning order: every instance comes after all selected instances
/// of its prerequisite types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
    pub steps: Vec<SelectedModule>,
}

impl ProvisioningPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Zero-based position of `instance` in the plan.
    pub fn position(&self, instance: InstanceId) -> Option<usize> {
        self.steps.iter().position(|m| m.instance == instance)
    }

    /// Instance ids in provisioning order.
    pub fn instances(&self) -> Vec<InstanceId> {
        self.steps.iter().map(|m| m.instance).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicate_instance() {
        let mut selection = SelectionSet::new();
        assert!(selection.add(InstanceId(1), ModuleType::from("vnet")));
        assert!(!selection.add(InstanceId(1), ModuleType::from("vm")));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.get(InstanceId(1)).map(|m| m.module_type.as_str()), Some("vnet"));
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut selection: SelectionSet = [
            SelectedModule::new(InstanceId(1), "vnet"),
            SelectedModule::new(InstanceId(2), "vm"),
            SelectedModule::new(InstanceId(3), "aks"),
        ]
        .into_iter()
        .collect();

        let removed = selection.remove(InstanceId(2));

        assert_eq!(removed, Some(SelectedModule::new(InstanceId(2), "vm")));
        let left: Vec<_> = selection.iter().map(|m| m.instance).collect();
        assert_eq!(left, vec![InstanceId(1), InstanceId(3)]);
        assert_eq!(selection.remove(InstanceId(2)), None);
    }

    #[test]
    fn serializes_as_list() {
        let selection: SelectionSet = [SelectedModule::new(InstanceId(1), "vnet")].into_iter().collect();
        let json = serde_json::to_string(&selection).unwrap();
        assert_eq!(json, r#"[{"instance":1,"module_type":"vnet"}]"#);
    }

    #[test]
    fn deserialize_drops_repeated_instances() {
        let selection: SelectionSet = serde_json::from_str(
            r#"[{"instance":1,"module_type":"vnet"},{"instance":1,"module_type":"vm"}]"#,
        )
        .unwrap();
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn plan_position_and_instances() {
        let plan = ProvisioningPlan {
            steps: vec![SelectedModule::new(InstanceId(4), "vnet"), SelectedModule::new(InstanceId(2), "vm")],
        };
        assert_eq!(plan.position(InstanceId(2)), Some(1));
        assert_eq!(plan.position(InstanceId(9)), None);
        assert_eq!(plan.instances(), vec![InstanceId(4), InstanceId(2)]);
    }
}
