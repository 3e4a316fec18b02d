//! Control Registry — the declarative compliance control catalog.
//!
//! Every control is one comparator primitive applied to an ordered list of
//! candidate field keys; nothing in here knows what raw producer shape a
//! field came from. The registry is plain immutable data built once at
//! startup and passed by reference into evaluation, so tests can substitute
//! a minimal subset.
//!
//! Catalog coverage:
//! - CIS Microsoft Azure Foundations Benchmark §10 (Storage Services)
//! - PCI DSS requirement mappings for storage, VMs, IAM principals and
//!   databases (a control may map to several clauses at once)

use serde_json::{Map, Value};

use crate::resolver;
use crate::types::ResourceKind;

// ── Comparators ──────────────────────────────────────────────────────────────

/// The single predicate primitive controls are built from. Absent-value
/// policy is carried by the comparator: restrictive comparators fail on
/// absent, prohibitive ones pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    EqualsIgnoreCase(&'static str),
    NotEqualsIgnoreCase(&'static str),
    IsTruthy,
    IsFalsy,
    IsPresent,
    IsAbsent,
    ContainsSubstring(&'static str),
    /// Numeric threshold: observed >= minimum. A present but non-numeric
    /// value is a control evaluation error, not a plain Fail.
    AtLeast(f64),
}

impl Comparator {
    pub fn apply(&self, observed: Option<&Value>) -> Result<bool, String> {
        match self {
            Comparator::EqualsIgnoreCase(want) => Ok(resolver::present(observed)
                && resolver::display(observed).eq_ignore_ascii_case(want)),
            Comparator::NotEqualsIgnoreCase(want) => Ok(!resolver::present(observed)
                || !resolver::display(observed).eq_ignore_ascii_case(want)),
            Comparator::IsTruthy => Ok(resolver::truthy(observed)),
            Comparator::IsFalsy => Ok(!resolver::truthy(observed)),
            Comparator::IsPresent => Ok(resolver::present(observed)),
            Comparator::IsAbsent => Ok(!resolver::present(observed)),
            Comparator::ContainsSubstring(needle) => {
                Ok(resolver::present(observed) && resolver::display(observed).contains(needle))
            }
            Comparator::AtLeast(min) => match observed {
                None | Some(Value::Null) => Ok(false),
                Some(v) => as_number(v).map(|n| n >= *min),
            },
        }
    }
}

fn as_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("value {} is not representable as f64", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("value \"{}\" is not numeric", s)),
        other => Err(format!("value {} is not numeric", other)),
    }
}

// ── Controls ─────────────────────────────────────────────────────────────────

/// One declarative compliance rule tied to one resource kind.
#[derive(Debug, Clone)]
pub struct Control {
    pub id: &'static str,
    pub kind: ResourceKind,
    /// Compliance clauses this control maps to. Metadata on the single
    /// CheckResult the control produces, never separate results.
    pub requirement_tags: &'static [&'static str],
    pub description: &'static str,
    /// Ordered candidate keys, newest/most specific spelling first.
    pub field: &'static [&'static str],
    pub comparator: Comparator,
}

/// Outcome of one predicate run: pass/fail plus the value actually
/// inspected, kept for evidence.
#[derive(Debug, Clone)]
pub struct PredicateResult {
    pub passed: bool,
    pub observed: Option<Value>,
}

impl Control {
    /// Pure predicate: resolve the field, apply the comparator. Errors are
    /// surfaced to the evaluator, which reports them as synthetic failures.
    pub fn check(&self, attributes: &Map<String, Value>) -> Result<PredicateResult, String> {
        let observed = resolver::resolve(attributes, self.field);
        let passed = self.comparator.apply(observed)?;
        Ok(PredicateResult { passed, observed: observed.cloned() })
    }

    /// Field name the evidence string is keyed by.
    pub fn evidence_label(&self) -> &'static str {
        self.field[0]
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ControlRegistry {
    controls: Vec<Control>,
}

impl ControlRegistry {
    pub fn new(controls: Vec<Control>) -> Self {
        Self { controls }
    }

    /// Controls applicable to one resource kind, in registration order.
    pub fn for_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Control> {
        self.controls.iter().filter(move |c| c.kind == kind)
    }

    pub fn get(&self, id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// The standard catalog: CIS Azure §10 storage controls plus the PCI DSS
    /// storage/VM/IAM/database controls.
    pub fn standard() -> Self {
        use Comparator::*;
        use ResourceKind::*;

        Self::new(vec![
            // ── Storage ──────────────────────────────────────────────────
            Control {
                id: "CIS-10.3.2.2",
                kind: Storage,
                requirement_tags: &["CIS-10.3.2.2", "PCI-1", "PCI-7"],
                description: "Storage: Public network access should be disabled.",
                field: &["publicNetworkAccess"],
                comparator: EqualsIgnoreCase("Disabled"),
            },
            Control {
                id: "CIS-10.3.2.1",
                kind: Storage,
                requirement_tags: &["CIS-10.3.2.1"],
                description: "Storage: Private endpoints must be used to access the account.",
                field: &["privateEndpoints"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.9",
                kind: Storage,
                requirement_tags: &["CIS-10.3.9", "PCI-7"],
                description: "Storage: Blob anonymous access should be disabled.",
                field: &["allowBlobPublicAccess"],
                comparator: IsFalsy,
            },
            Control {
                id: "PCI-STG-ENCRYPTION",
                kind: Storage,
                requirement_tags: &["PCI-3"],
                description: "Storage: Encryption at rest must be enabled.",
                field: &["encryption.services"],
                comparator: IsTruthy,
            },
            Control {
                id: "PCI-STG-LOGGING",
                kind: Storage,
                requirement_tags: &["PCI-10"],
                description: "Storage: Access logging/diagnostics must be enabled.",
                field: &["diagnosticSettings"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.4",
                kind: Storage,
                requirement_tags: &["CIS-10.3.4"],
                description: "Storage: Secure transfer (HTTPS only) must be enforced.",
                field: &["enableHttpsTrafficOnly", "supportsHttpsTrafficOnly"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.7",
                kind: Storage,
                requirement_tags: &["CIS-10.3.7"],
                description: "Storage: Minimum TLS version must be 1.2.",
                field: &["minimumTlsVersion"],
                comparator: EqualsIgnoreCase("TLS1_2"),
            },
            Control {
                id: "CIS-10.3.1.3",
                kind: Storage,
                requirement_tags: &["CIS-10.3.1.3"],
                description: "Storage: Shared key access must be disallowed.",
                field: &["allowSharedKeyAccess"],
                comparator: IsFalsy,
            },
            Control {
                id: "CIS-10.3.8",
                kind: Storage,
                requirement_tags: &["CIS-10.3.8"],
                description: "Storage: Cross-tenant replication must be disallowed.",
                field: &["allowCrossTenantReplication"],
                comparator: IsFalsy,
            },
            Control {
                id: "CIS-10.3.2.3",
                kind: Storage,
                requirement_tags: &["CIS-10.3.2.3"],
                description: "Storage: Network default action must be Deny.",
                field: &["defaultAction", "networkAcls.defaultAction"],
                comparator: EqualsIgnoreCase("Deny"),
            },
            Control {
                id: "CIS-10.3.3.1",
                kind: Storage,
                requirement_tags: &["CIS-10.3.3.1"],
                description: "Storage: Must default to Microsoft Entra authorization.",
                field: &["defaultToAzureADAuth", "defaultToOAuthAuthentication"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.5",
                kind: Storage,
                requirement_tags: &["CIS-10.3.5"],
                description: "Storage: Trusted Azure services must bypass network rules.",
                field: &["bypass", "networkAcls.bypass"],
                comparator: ContainsSubstring("AzureServices"),
            },
            Control {
                id: "CIS-10.2.1",
                kind: Storage,
                requirement_tags: &["CIS-10.2.1"],
                description: "Storage: Blob soft delete must be enabled.",
                field: &["blobSoftDelete", "deleteRetentionPolicy.enabled"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.2.2",
                kind: Storage,
                requirement_tags: &["CIS-10.2.2"],
                description: "Storage: Blob versioning must be enabled.",
                field: &["isVersioningEnabled"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.6",
                kind: Storage,
                requirement_tags: &["CIS-10.3.6"],
                description: "Storage: Container soft delete must be enabled.",
                field: &["containerDeleteRetentionPolicy"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.1.1",
                kind: Storage,
                requirement_tags: &["CIS-10.3.1.1"],
                description: "Storage: Key rotation reminders must be enabled.",
                field: &["keyRotationReminders", "keyPolicy.keyExpirationPeriodInDays"],
                comparator: IsTruthy,
            },
            Control {
                id: "CIS-10.3.1.2",
                kind: Storage,
                requirement_tags: &["CIS-10.3.1.2"],
                description: "Storage: Account keys must have a regeneration record.",
                field: &["keyCreationTime"],
                comparator: IsPresent,
            },
            Control {
                id: "CIS-10.3.12",
                kind: Storage,
                requirement_tags: &["CIS-10.3.12"],
                description: "Storage: Account must use geo-redundant (GRS) replication.",
                field: &["sku", "sku.name"],
                comparator: ContainsSubstring("GRS"),
            },
            Control {
                id: "CIS-10.3.10",
                kind: Storage,
                requirement_tags: &["CIS-10.3.10"],
                description: "Storage: A Delete resource lock must be present.",
                field: &["resourceLocks"],
                comparator: ContainsSubstring("Delete"),
            },
            Control {
                id: "CIS-10.3.11",
                kind: Storage,
                requirement_tags: &["CIS-10.3.11"],
                description: "Storage: A ReadOnly resource lock must be present.",
                field: &["resourceLocks"],
                comparator: ContainsSubstring("ReadOnly"),
            },
            Control {
                id: "CIS-10.1.1",
                kind: Storage,
                requirement_tags: &["CIS-10.1.1"],
                description: "Storage: File share soft delete retention must be at least 7 days.",
                field: &["fileSoftDeleteRetentionDays", "shareDeleteRetentionPolicy.days"],
                comparator: AtLeast(7.0),
            },
            Control {
                id: "CIS-10.1.3",
                kind: Storage,
                requirement_tags: &["CIS-10.1.3"],
                description: "Storage: SMB channel encryption must be AES-256-GCM or higher.",
                field: &["smbChannelEncryption"],
                comparator: ContainsSubstring("AES-256-GCM"),
            },
            // ── Virtual machines ─────────────────────────────────────────
            Control {
                id: "PCI-VM-PATCH",
                kind: VirtualMachine,
                requirement_tags: &["PCI-6"],
                description: "VM: Must run the latest OS model/patch.",
                field: &["latestModelApplied"],
                comparator: IsTruthy,
            },
            Control {
                id: "PCI-VM-NETWORK",
                kind: VirtualMachine,
                requirement_tags: &["PCI-1", "PCI-7"],
                description: "VM: Network profile/NSG restrictions must be present.",
                field: &["networkProfile"],
                comparator: IsPresent,
            },
            Control {
                id: "PCI-VM-DISK-ENCRYPTION",
                kind: VirtualMachine,
                requirement_tags: &["PCI-3"],
                description: "VM: OS disk encryption must be enabled.",
                field: &["storageProfile.osDisk.encryptionSettings"],
                comparator: IsTruthy,
            },
            Control {
                id: "PCI-VM-DIAGNOSTICS",
                kind: VirtualMachine,
                requirement_tags: &["PCI-10"],
                description: "VM: Diagnostics logging must be enabled.",
                field: &["diagnosticsProfile"],
                comparator: IsPresent,
            },
            // ── Identity principals ──────────────────────────────────────
            Control {
                id: "PCI-IAM-GUEST",
                kind: IdentityPrincipal,
                requirement_tags: &["PCI-7"],
                description: "IAM: Guest users must not hold privileged roles.",
                field: &["userType"],
                comparator: NotEqualsIgnoreCase("Guest"),
            },
            Control {
                id: "PCI-IAM-MFA",
                kind: IdentityPrincipal,
                requirement_tags: &["PCI-8"],
                description: "IAM: MFA must be enforced for this principal.",
                field: &["mfaEnabled", "strongAuthenticationMethods"],
                comparator: IsTruthy,
            },
            // ── Databases ────────────────────────────────────────────────
            Control {
                id: "PCI-DB-TDE",
                kind: Database,
                requirement_tags: &["PCI-3", "PCI-4"],
                description: "DB: Transparent Data Encryption must be enabled.",
                field: &["encryptionProtector"],
                comparator: IsPresent,
            },
            Control {
                id: "PCI-DB-CONTAINMENT",
                kind: Database,
                requirement_tags: &["PCI-7"],
                description: "DB: Proper access containment must be configured.",
                field: &["containmentState"],
                comparator: IsTruthy,
            },
            Control {
                id: "PCI-DB-AUDIT",
                kind: Database,
                requirement_tags: &["PCI-10"],
                description: "DB: Auditing/logging must be enabled.",
                field: &["auditSettings"],
                comparator: IsTruthy,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_equals_ignore_case() {
        let c = Comparator::EqualsIgnoreCase("Disabled");
        assert!(c.apply(Some(&json!("disabled"))).unwrap());
        assert!(!c.apply(Some(&json!("Enabled"))).unwrap());
        // absence fails restrictive controls
        assert!(!c.apply(None).unwrap());
    }

    #[test]
    fn test_not_equals_passes_on_absent() {
        let c = Comparator::NotEqualsIgnoreCase("Guest");
        assert!(c.apply(Some(&json!("Member"))).unwrap());
        assert!(!c.apply(Some(&json!("guest"))).unwrap());
        assert!(c.apply(None).unwrap());
    }

    #[test]
    fn test_presence_comparators() {
        assert!(Comparator::IsPresent.apply(Some(&json!({"x": 1}))).unwrap());
        assert!(!Comparator::IsPresent.apply(None).unwrap());
        assert!(!Comparator::IsPresent.apply(Some(&serde_json::Value::Null)).unwrap());
        assert!(Comparator::IsAbsent.apply(None).unwrap());
        assert!(!Comparator::IsAbsent.apply(Some(&json!(0))).unwrap());
    }

    #[test]
    fn test_contains_substring() {
        let c = Comparator::ContainsSubstring("AzureServices");
        assert!(c.apply(Some(&json!("Logging, AzureServices"))).unwrap());
        assert!(!c.apply(Some(&json!("None"))).unwrap());
        assert!(!c.apply(None).unwrap());
        // stringified collections are searched too, as with resource locks
        let locks = Comparator::ContainsSubstring("Delete");
        assert!(locks.apply(Some(&json!(["Delete", "ReadOnly"]))).unwrap());
    }

    #[test]
    fn test_at_least_threshold() {
        let c = Comparator::AtLeast(7.0);
        assert!(c.apply(Some(&json!(7))).unwrap());
        assert!(c.apply(Some(&json!("14"))).unwrap());
        assert!(!c.apply(Some(&json!(3))).unwrap());
        assert!(!c.apply(None).unwrap());
        assert!(c.apply(Some(&json!("ninety"))).is_err());
        assert!(c.apply(Some(&json!({"days": 7}))).is_err());
    }

    #[test]
    fn test_control_check_resolves_fallback_keys() {
        let registry = ControlRegistry::standard();
        let https = registry.get("CIS-10.3.4").unwrap();
        let bag = json!({"supportsHttpsTrafficOnly": true}).as_object().unwrap().clone();
        let result = https.check(&bag).unwrap();
        assert!(result.passed);
        assert_eq!(result.observed, Some(json!(true)));
    }

    #[test]
    fn test_resource_lock_controls() {
        let registry = ControlRegistry::standard();
        let bag = json!({"resourceLocks": ["Delete"]}).as_object().unwrap().clone();
        assert!(registry.get("CIS-10.3.10").unwrap().check(&bag).unwrap().passed);
        assert!(!registry.get("CIS-10.3.11").unwrap().check(&bag).unwrap().passed);

        let both = json!({"resourceLocks": ["Delete", "ReadOnly"]}).as_object().unwrap().clone();
        assert!(registry.get("CIS-10.3.11").unwrap().check(&both).unwrap().passed);
    }

    #[test]
    fn test_key_and_endpoint_controls() {
        let registry = ControlRegistry::standard();
        let bag = json!({
            "keyCreationTime": "2024-01-02T00:00:00Z",
            "privateEndpoints": [{"id": "/pe/1"}],
            "containerDeleteRetentionPolicy": {"enabled": true},
            "smbChannelEncryption": "AES-256-GCM"
        })
        .as_object()
        .unwrap()
        .clone();
        for id in ["CIS-10.3.1.2", "CIS-10.3.2.1", "CIS-10.3.6", "CIS-10.1.3"] {
            assert!(registry.get(id).unwrap().check(&bag).unwrap().passed, "{} should pass", id);
        }

        let empty = json!({}).as_object().unwrap().clone();
        for id in ["CIS-10.3.1.2", "CIS-10.3.2.1", "CIS-10.3.6", "CIS-10.1.3"] {
            assert!(!registry.get(id).unwrap().check(&empty).unwrap().passed, "{} should fail on absence", id);
        }
    }

    #[test]
    fn test_standard_catalog_shape() {
        let registry = ControlRegistry::standard();
        assert!(!registry.is_empty());

        let mut seen = HashSet::new();
        for kind in [
            ResourceKind::Storage,
            ResourceKind::VirtualMachine,
            ResourceKind::IdentityPrincipal,
            ResourceKind::Database,
        ] {
            let controls: Vec<_> = registry.for_kind(kind).collect();
            assert!(!controls.is_empty(), "no controls for {:?}", kind);
            for c in controls {
                assert!(seen.insert(c.id), "duplicate control id {}", c.id);
                assert!(!c.field.is_empty());
                assert!(!c.requirement_tags.is_empty());
            }
        }
        assert_eq!(seen.len(), registry.len());
    }
}
