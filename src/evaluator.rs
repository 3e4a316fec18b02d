//! Evaluator — applies the control catalog to normalized resources.
//!
//! Features:
//! - Pure [`evaluate`] core: identical input produces byte-identical ordered
//!   output (input resource order, then control-registration order)
//! - Evidence on every result, Pass or Fail, keyed by the field inspected
//! - Per-control error isolation: a predicate error becomes a synthetic Fail
//!   and never aborts the remaining resource×control cross product
//! - [`AuditEngine`] orchestrator: normalization, counters, bounded alert
//!   buffer, compliance summary

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::loader::RawEntry;
use crate::normalizer::{normalize, Normalized, Resource};
use crate::registry::ControlRegistry;
use crate::report::CheckResult;
use crate::resolver;
use crate::types::{AuditAlert, CheckStatus, Severity};

const MAX_ALERTS: usize = 5_000;

// ── Core evaluate ────────────────────────────────────────────────────────────

/// Run every applicable control against every resource.
///
/// No I/O, no hidden state: the reference behavior for the whole engine,
/// sequential by definition even if callers shard resources across workers.
pub fn evaluate(resources: &[Resource], registry: &ControlRegistry) -> Vec<CheckResult> {
    let mut results = Vec::new();
    for resource in resources {
        for control in registry.for_kind(resource.kind) {
            let (status, evidence) = match control.check(&resource.attributes) {
                Ok(outcome) => {
                    let status = if outcome.passed { CheckStatus::Pass } else { CheckStatus::Fail };
                    let evidence = format!(
                        "{}={}",
                        control.evidence_label(),
                        resolver::display(outcome.observed.as_ref())
                    );
                    (status, evidence)
                }
                Err(cause) => (CheckStatus::Fail, format!("evaluation error: {}", cause)),
            };
            results.push(CheckResult {
                resource_id: resource.id.clone(),
                resource_name: resource.name.clone(),
                group: resource.group.clone(),
                resource_type: resource.kind,
                control_id: control.id.to_string(),
                requirement_tags: control.requirement_tags.iter().map(|t| t.to_string()).collect(),
                description: control.description.to_string(),
                status,
                evidence,
            });
        }
    }
    results
}

// ── Audit Engine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AuditSummary {
    pub total_resources: u64,
    pub skipped_resources: u64,
    pub total_checks: u64,
    pub failed_checks: u64,
    pub compliance_pct: f64,
}

/// Orchestrates one audit pass: raw entries → normalize → evaluate, with
/// operational counters and alerts around the pure core.
pub struct AuditEngine {
    registry: ControlRegistry,
    alerts: RwLock<Vec<AuditAlert>>,
    total_resources: AtomicU64,
    skipped_resources: AtomicU64,
    total_checks: AtomicU64,
    failed_checks: AtomicU64,
    enabled: bool,
}

impl AuditEngine {
    pub fn new(registry: ControlRegistry) -> Self {
        Self {
            registry,
            alerts: RwLock::new(Vec::new()),
            total_resources: AtomicU64::new(0),
            skipped_resources: AtomicU64::new(0),
            total_checks: AtomicU64::new(0),
            failed_checks: AtomicU64::new(0),
            enabled: true,
        }
    }

    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    pub fn run(&self, entries: &[RawEntry]) -> Vec<CheckResult> {
        if !self.enabled {
            return Vec::new();
        }
        let now = chrono::Utc::now().timestamp();

        let mut resources = Vec::new();
        for (raw, hint) in entries {
            self.total_resources.fetch_add(1, Ordering::Relaxed);
            match normalize(raw, *hint) {
                Normalized::Canonical(resource) => resources.push(resource),
                Normalized::UnknownKind => {
                    self.skipped_resources.fetch_add(1, Ordering::Relaxed);
                }
                Normalized::Unidentifiable => {
                    self.skipped_resources.fetch_add(1, Ordering::Relaxed);
                    self.add_alert(
                        now,
                        Severity::Medium,
                        "Unidentifiable resource",
                        "resource entry had neither id nor name and was skipped",
                    );
                }
            }
        }

        let results = evaluate(&resources, &self.registry);
        self.total_checks.fetch_add(results.len() as u64, Ordering::Relaxed);
        for result in results.iter().filter(|r| r.failed()) {
            self.failed_checks.fetch_add(1, Ordering::Relaxed);
            let target = if result.resource_id.is_empty() {
                &result.resource_name
            } else {
                &result.resource_id
            };
            if result.evidence.starts_with("evaluation error") {
                warn!(control = %result.control_id, resource = %target, evidence = %result.evidence, "Control evaluation error");
                self.add_alert(
                    now,
                    Severity::High,
                    "Control evaluation error",
                    &format!("{} on {}: {}", result.control_id, target, result.evidence),
                );
            } else {
                debug!(control = %result.control_id, resource = %target, evidence = %result.evidence, "Check failed");
                self.add_alert(
                    now,
                    Severity::Medium,
                    "Non-compliant check",
                    &format!("{} failed on {} ({})", result.control_id, target, result.evidence),
                );
            }
        }
        results
    }

    fn add_alert(&self, ts: i64, severity: Severity, title: &str, details: &str) {
        let mut alerts = self.alerts.write();
        if alerts.len() >= MAX_ALERTS {
            alerts.remove(0);
        }
        alerts.push(AuditAlert {
            timestamp: ts,
            severity,
            component: "audit_engine".into(),
            title: title.into(),
            details: details.into(),
        });
    }

    pub fn alerts(&self) -> Vec<AuditAlert> {
        self.alerts.read().clone()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn summary(&self) -> AuditSummary {
        let total = self.total_checks.load(Ordering::Relaxed);
        let failed = self.failed_checks.load(Ordering::Relaxed);
        AuditSummary {
            total_resources: self.total_resources.load(Ordering::Relaxed),
            skipped_resources: self.skipped_resources.load(Ordering::Relaxed),
            total_checks: total,
            failed_checks: failed,
            compliance_pct: if total > 0 {
                (total - failed) as f64 / total as f64 * 100.0
            } else {
                100.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Comparator, Control};
    use crate::types::ResourceKind;
    use serde_json::json;

    fn storage_resource(attributes: serde_json::Value) -> Resource {
        Resource {
            id: "/sub/x/rg/g1/storageAccounts/s1".into(),
            name: "s1".into(),
            group: "g1".into(),
            kind: ResourceKind::Storage,
            attributes: attributes.as_object().unwrap().clone(),
        }
    }

    fn mini_registry() -> ControlRegistry {
        ControlRegistry::new(vec![
            Control {
                id: "CIS-10.3.2.2",
                kind: ResourceKind::Storage,
                requirement_tags: &["CIS-10.3.2.2", "PCI-1", "PCI-7"],
                description: "Storage: Public network access should be disabled.",
                field: &["publicNetworkAccess"],
                comparator: Comparator::EqualsIgnoreCase("Disabled"),
            },
            Control {
                id: "CIS-10.3.9",
                kind: ResourceKind::Storage,
                requirement_tags: &["CIS-10.3.9", "PCI-7"],
                description: "Storage: Blob anonymous access should be disabled.",
                field: &["allowBlobPublicAccess"],
                comparator: Comparator::IsFalsy,
            },
        ])
    }

    #[test]
    fn test_pass_and_fail_with_evidence() {
        let resource = storage_resource(json!({
            "publicNetworkAccess": "Enabled",
            "allowBlobPublicAccess": false
        }));
        let results = evaluate(&[resource], &mini_registry());
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].status, CheckStatus::Fail);
        assert_eq!(results[0].evidence, "publicNetworkAccess=Enabled");
        assert_eq!(results[0].requirement_tags, vec!["CIS-10.3.2.2", "PCI-1", "PCI-7"]);

        assert_eq!(results[1].status, CheckStatus::Pass);
        assert_eq!(results[1].evidence, "allowBlobPublicAccess=false");
    }

    #[test]
    fn test_absent_field_is_evidence_not_error() {
        let resource = storage_resource(json!({}));
        let results = evaluate(&[resource], &mini_registry());
        assert_eq!(results[0].status, CheckStatus::Fail);
        assert_eq!(results[0].evidence, "publicNetworkAccess=absent");
        // prohibitive control passes on absence
        assert_eq!(results[1].status, CheckStatus::Pass);
        assert_eq!(results[1].evidence, "allowBlobPublicAccess=absent");
    }

    #[test]
    fn test_evaluation_error_is_isolated() {
        let registry = ControlRegistry::new(vec![
            Control {
                id: "CIS-10.1.1",
                kind: ResourceKind::Storage,
                requirement_tags: &["CIS-10.1.1"],
                description: "Storage: File share soft delete retention must be at least 7 days.",
                field: &["fileSoftDeleteRetentionDays"],
                comparator: Comparator::AtLeast(7.0),
            },
            Control {
                id: "CIS-10.2.2",
                kind: ResourceKind::Storage,
                requirement_tags: &["CIS-10.2.2"],
                description: "Storage: Blob versioning must be enabled.",
                field: &["isVersioningEnabled"],
                comparator: Comparator::IsTruthy,
            },
        ]);
        let resource = storage_resource(json!({
            "fileSoftDeleteRetentionDays": "ninety",
            "isVersioningEnabled": true
        }));
        let results = evaluate(&[resource], &registry);
        assert_eq!(results.len(), 2, "error must not abort remaining controls");
        assert_eq!(results[0].status, CheckStatus::Fail);
        assert!(results[0].evidence.starts_with("evaluation error:"));
        assert_eq!(results[1].status, CheckStatus::Pass);
    }

    #[test]
    fn test_deterministic_ordering() {
        let resources = vec![
            storage_resource(json!({"publicNetworkAccess": "Disabled"})),
            storage_resource(json!({"publicNetworkAccess": "Enabled"})),
        ];
        let registry = mini_registry();
        let a = evaluate(&resources, &registry);
        let b = evaluate(&resources, &registry);
        assert_eq!(a, b);
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn test_engine_counters_and_alerts() {
        let engine = AuditEngine::new(mini_registry());
        let entries: Vec<RawEntry> = vec![
            (json!({"type": "storage", "id": "/sub/x/rg/g1/storageAccounts/s1", "publicNetworkAccess": "Enabled"}), None),
            (json!({"type": "storage", "publicNetworkAccess": "Enabled"}), None), // unidentifiable
            (json!({"type": "networkInterface", "id": "/n/1"}), None),            // unknown kind
        ];
        let results = engine.run(&entries);
        assert_eq!(results.len(), 2);

        let summary = engine.summary();
        assert_eq!(summary.total_resources, 3);
        assert_eq!(summary.skipped_resources, 2);
        assert_eq!(summary.total_checks, 2);
        assert_eq!(summary.failed_checks, 1);
        assert!((summary.compliance_pct - 50.0).abs() < f64::EPSILON);

        let alerts = engine.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].title, "Unidentifiable resource");
        assert_eq!(alerts[1].title, "Non-compliant check");
        assert!(alerts[1].details.contains("CIS-10.3.2.2"));
        assert!(alerts[1].details.contains("publicNetworkAccess=Enabled"));
    }

    #[test]
    fn test_disabled_engine_produces_nothing() {
        let mut engine = AuditEngine::new(mini_registry());
        engine.set_enabled(false);
        let entries: Vec<RawEntry> =
            vec![(json!({"type": "storage", "id": "/s/1"}), None)];
        assert!(engine.run(&entries).is_empty());
    }
}
