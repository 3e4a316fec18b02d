//! Remediation Mapper — failed checks → idempotent corrective commands.
//!
//! Templates are keyed by control id; controls the remediation catalog has
//! not caught up with are skipped silently so the control catalog can grow
//! faster than this table. Account-level commands target the resource id
//! directly; blob/file service settings live on a sub-resource, so those
//! commands derive the account name and resource group from the id path.
//! Every command is an absolute-state `az ... update`, so re-running the
//! script against an already-compliant resource changes nothing.

use crate::normalizer::{resource_group_of, resource_name_of};
use crate::report::CheckResult;

/// One corrective command for one failing (resource, control) pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RemediationAction {
    pub control_id: String,
    pub resource_id: String,
    pub description: String,
    pub command: String,
}

/// Which az surface the fix is applied through.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Account,
    BlobService,
    FileService,
}

const TEMPLATES: &[(&str, Scope, &str)] = &[
    ("CIS-10.3.1.3", Scope::Account, "--allow-shared-key-access false"),
    ("CIS-10.3.2.2", Scope::Account, "--public-network-access Disabled"),
    ("CIS-10.3.2.3", Scope::Account, "--default-action Deny"),
    ("CIS-10.3.3.1", Scope::Account, "--default-to-oauth-authentication true"),
    ("CIS-10.3.4", Scope::Account, "--https-only true"),
    ("CIS-10.3.5", Scope::Account, "--bypass AzureServices"),
    ("CIS-10.3.7", Scope::Account, "--min-tls-version TLS1_2"),
    ("CIS-10.3.8", Scope::Account, "--allow-cross-tenant-replication false"),
    ("CIS-10.3.9", Scope::Account, "--allow-blob-public-access false"),
    ("CIS-10.3.12", Scope::Account, "--sku Standard_GRS"),
    ("CIS-10.2.1", Scope::BlobService, "--enable-delete-retention true --delete-retention-days 90"),
    ("CIS-10.2.2", Scope::BlobService, "--enable-versioning true"),
    ("CIS-10.3.6", Scope::BlobService, "--enable-container-delete-retention true --container-delete-retention-days 90"),
    ("CIS-10.1.1", Scope::FileService, "--enable-delete-retention true --delete-retention-days 7"),
    ("CIS-10.1.3", Scope::FileService, "--channel-encryption AES-256-GCM"),
];

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Render the command, or nothing when it cannot be fully parameterized.
/// A resource may be identified by name alone (e.g. a plan entry that has
/// no id yet); the result's own name/group fields are the fallback, and a
/// command with an empty target parameter is never emitted.
fn render_command(scope: Scope, result: &CheckResult, args: &str) -> Option<String> {
    let name = non_empty(resource_name_of(&result.resource_id))
        .or_else(|| non_empty(result.resource_name.clone()));
    let group = non_empty(resource_group_of(&result.resource_id))
        .or_else(|| non_empty(result.group.clone()));
    match scope {
        Scope::Account => {
            if !result.resource_id.is_empty() {
                return Some(format!(
                    "az storage account update --ids \"{}\" {}",
                    result.resource_id, args
                ));
            }
            Some(format!(
                "az storage account update --name {} --resource-group {} {}",
                name?, group?, args
            ))
        }
        Scope::BlobService => Some(format!(
            "az storage account blob-service-properties update --account-name {} --resource-group {} {}",
            name?, group?, args
        )),
        Scope::FileService => Some(format!(
            "az storage account file-service-properties update --account-name {} --resource-group {} {}",
            name?, group?, args
        )),
    }
}

/// Map every failing CheckResult with a registered template to an action.
pub fn map_remediation(results: &[CheckResult]) -> Vec<RemediationAction> {
    let mut actions = Vec::new();
    for result in results.iter().filter(|r| r.failed()) {
        let Some(&(_, scope, args)) = TEMPLATES.iter().find(|(id, _, _)| *id == result.control_id)
        else {
            continue;
        };
        let Some(command) = render_command(scope, result, args) else {
            continue;
        };
        actions.push(RemediationAction {
            control_id: result.control_id.clone(),
            resource_id: result.resource_id.clone(),
            description: result.description.clone(),
            command,
        });
    }
    actions
}

/// Render the advisory remediation script. Never executed by this system.
pub fn render_script(actions: &[RemediationAction]) -> String {
    let mut script = String::from(
        "#!/bin/bash\n# Auto-generated compliance remediation script\nset -e\n\n",
    );
    if actions.is_empty() {
        script.push_str("# No action required: all evaluated resources are compliant.\n");
        return script;
    }
    for action in actions {
        script.push_str(&format!("# Remediating: {}\n{}\n\n", action.description, action.command));
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckStatus, ResourceKind};

    fn result(control_id: &str, status: CheckStatus) -> CheckResult {
        CheckResult {
            resource_id: "/sub/x/resourceGroups/g1/providers/Microsoft.Storage/storageAccounts/s1".into(),
            resource_name: "s1".into(),
            group: "g1".into(),
            resource_type: ResourceKind::Storage,
            control_id: control_id.into(),
            requirement_tags: vec![control_id.into()],
            description: format!("desc for {}", control_id),
            status,
            evidence: "x=y".into(),
        }
    }

    #[test]
    fn test_only_failures_with_templates_map() {
        let results = vec![
            result("CIS-10.3.2.2", CheckStatus::Fail),
            result("CIS-10.3.2.2", CheckStatus::Pass),
            result("PCI-VM-PATCH", CheckStatus::Fail), // no template: silent skip
        ];
        let actions = map_remediation(&results);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].control_id, "CIS-10.3.2.2");
        assert!(actions[0].command.contains("--public-network-access Disabled"));
        assert!(actions[0].command.contains(&results[0].resource_id));
    }

    #[test]
    fn test_blob_service_scope_derives_name_and_group() {
        let actions = map_remediation(&[result("CIS-10.2.2", CheckStatus::Fail)]);
        assert_eq!(actions.len(), 1);
        let cmd = &actions[0].command;
        assert!(cmd.starts_with("az storage account blob-service-properties update"));
        assert!(cmd.contains("--account-name s1"));
        assert!(cmd.contains("--resource-group g1"));
        assert!(cmd.contains("--enable-versioning true"));
    }

    #[test]
    fn test_container_soft_delete_template() {
        let actions = map_remediation(&[result("CIS-10.3.6", CheckStatus::Fail)]);
        assert_eq!(actions.len(), 1);
        assert!(actions[0].command.contains("--enable-container-delete-retention true"));
        assert!(actions[0].command.contains("--account-name s1"));
    }

    #[test]
    fn test_sub_resource_target_falls_back_to_result_fields() {
        // name-only resource: the id never carried name or group segments
        let mut r = result("CIS-10.2.2", CheckStatus::Fail);
        r.resource_id = String::new();
        let actions = map_remediation(&[r]);
        assert_eq!(actions.len(), 1);
        assert!(actions[0].command.contains("--account-name s1"));
        assert!(actions[0].command.contains("--resource-group g1"));
    }

    #[test]
    fn test_unparameterizable_command_is_skipped() {
        let mut r = result("CIS-10.2.2", CheckStatus::Fail);
        r.resource_id = String::new();
        r.resource_name = "tfsa".into();
        r.group = String::new();
        assert!(map_remediation(&[r.clone()]).is_empty());

        // account-level commands need a full target too
        r.control_id = "CIS-10.3.2.2".into();
        assert!(map_remediation(&[r]).is_empty());
    }

    #[test]
    fn test_account_scope_falls_back_to_name_and_group() {
        let mut r = result("CIS-10.3.2.2", CheckStatus::Fail);
        r.resource_id = String::new();
        let actions = map_remediation(&[r]);
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].command,
            "az storage account update --name s1 --resource-group g1 --public-network-access Disabled"
        );
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let results = vec![
            result("CIS-10.3.9", CheckStatus::Fail),
            result("CIS-10.2.1", CheckStatus::Fail),
        ];
        assert_eq!(map_remediation(&results), map_remediation(&results));
    }

    #[test]
    fn test_script_rendering() {
        let actions = map_remediation(&[result("CIS-10.3.7", CheckStatus::Fail)]);
        let script = render_script(&actions);
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("# Remediating: desc for CIS-10.3.7\n"));
        assert!(script.contains("--min-tls-version TLS1_2"));

        let empty = render_script(&[]);
        assert!(empty.starts_with("#!/bin/bash\n"));
        assert!(empty.contains("# No action required"));
        assert!(!empty.contains("az "));
    }
}
