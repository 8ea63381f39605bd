//! The curated Azure module catalog.
//!
//! Requirements use canonical module ids only. Account-level needs such as
//! the subscription or region are recorded as context requirements, and the
//! generic "storage" requirement of the storage children is spelled as the
//! concrete `storage_account` type.

use super::{
    CascadeRule, ModuleDescriptor, OptionKind, RequirementCatalog, RootOptionSource, RuleTable,
};

const SUBSCRIPTION: &str = "Subscription";
const REGION: &str = "Region";
const RESOURCE_GROUP: &str = "Resource Group";

/// Module types whose forms pick an existing network and subnet.
const NETWORKED: [&str; 2] = ["vm", "aks"];

fn descriptors() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor::new("vnet", "Virtual Network")
            .category("networking")
            .description("Private, isolated network. Defines IP space, subnets, and security boundaries.")
            .needs_context(SUBSCRIPTION)
            .needs_context(REGION),
        ModuleDescriptor::new("vm", "Virtual Machine")
            .category("compute")
            .description("On-demand Linux/Windows servers.")
            .requires("vnet"),
        ModuleDescriptor::new("aks", "AKS Cluster")
            .category("compute")
            .description("Managed Kubernetes service.")
            .requires("vnet"),
        ModuleDescriptor::new("logic_app", "Logic App")
            .category("compute")
            .description("Workflow automation with connectors to external services.")
            .needs_context(SUBSCRIPTION)
            .needs_context(REGION),
        ModuleDescriptor::new("event_grid", "Event Grid")
            .category("messaging")
            .description("Serverless publish-subscribe event routing.")
            .needs_context(SUBSCRIPTION)
            .needs_context(REGION),
        ModuleDescriptor::new("azure_ad", "Azure AD Application")
            .category("security")
            .description("Application registration for authentication and authorization.")
            .needs_context(SUBSCRIPTION),
        ModuleDescriptor::new("storage_account", "Storage Account")
            .category("storage")
            .description("Account for blob, queue, table, and file storage.")
            .needs_context(SUBSCRIPTION)
            .needs_context(REGION),
        ModuleDescriptor::new("blob_storage", "Blob Container")
            .category("storage")
            .description("Object storage for unstructured data.")
            .requires("storage_account"),
        ModuleDescriptor::new("azure_files", "File Share")
            .category("storage")
            .description("Managed SMB/NFS file shares.")
            .requires("storage_account"),
        ModuleDescriptor::new("azure_queuestorage", "Storage Queue")
            .category("messaging")
            .description("Queue service for decoupling applications.")
            .requires("storage_account"),
        ModuleDescriptor::new("cosmos_db", "Cosmos DB")
            .category("database")
            .description("Globally distributed multi-model NoSQL database.")
            .needs_context(SUBSCRIPTION),
        ModuleDescriptor::new("key_vault", "Key Vault")
            .category("security")
            .description("Store keys, secrets, and certificates.")
            .needs_context(SUBSCRIPTION),
        ModuleDescriptor::new("applications_insights", "Application Insights")
            .category("monitoring")
            .description("Application performance and availability monitoring.")
            .needs_context(SUBSCRIPTION)
            .needs_context(RESOURCE_GROUP),
        ModuleDescriptor::new("log_analytics", "Log Analytics Workspace")
            .category("monitoring")
            .description("Centralized log storage and query.")
            .needs_context(SUBSCRIPTION)
            .needs_context(RESOURCE_GROUP),
        ModuleDescriptor::new("advisor_alert", "Advisor Alert")
            .category("monitoring")
            .description("Alerts for Advisor recommendations.")
            .needs_context(SUBSCRIPTION)
            .needs_context(RESOURCE_GROUP),
        ModuleDescriptor::new("microsoft_defender", "Security Center")
            .category("security")
            .description("Unified security management and threat protection.")
            .needs_context(SUBSCRIPTION),
    ]
}

/// The Azure requirement catalog.
pub fn azure_catalog() -> RequirementCatalog {
    // Every requirement above names a declared id exactly once.
    RequirementCatalog::new(descriptors()).unwrap_or_default()
}

/// Cascade rules for the Azure module forms.
///
/// Networked modules pick an account, then a network within that account's
/// subscription, then a subnet within that network. The account list is a
/// root source; a sole saved account is selected automatically.
pub fn azure_rules() -> RuleTable {
    let mut rules = Vec::new();
    let mut roots = Vec::new();
    for module_type in NETWORKED {
        rules.push(CascadeRule::new(module_type, "account", "vnet").with_refetch(OptionKind::Network));
        rules.push(CascadeRule::new(module_type, "vnet", "subnet").with_refetch(OptionKind::Subnet));
        roots.push(RootOptionSource::new(module_type, "account", OptionKind::Account).auto_select_single());
    }
    RuleTable::new(rules, roots).unwrap_or_default()
}
