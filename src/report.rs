//! Audit report rows and their JSON rendering.
//!
//! Field presence is total: every row carries every field, with empty
//! strings where a field does not apply (e.g. `group` for IAM principals),
//! so downstream report consumers never branch on missing keys.

use crate::error::AuditResult;
use crate::types::{CheckStatus, ResourceKind};

/// One (resource, control) verdict with the evidence that produced it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub resource_id: String,
    pub resource_name: String,
    pub group: String,
    pub resource_type: ResourceKind,
    pub control_id: String,
    pub requirement_tags: Vec<String>,
    pub description: String,
    pub status: CheckStatus,
    pub evidence: String,
}

impl CheckResult {
    pub fn failed(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

/// Render the full report as a JSON array.
pub fn to_json(results: &[CheckResult]) -> AuditResult<String> {
    Ok(serde_json::to_string_pretty(results)?)
}
