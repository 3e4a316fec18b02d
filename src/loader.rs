//! Input Loader — boundary between the external collector and the engine.
//!
//! Accepts every container shape the collector family has ever produced,
//! without configuration: a bare JSON array, `{"resources": [...]}`,
//! Terraform-plan-style `{"resource_changes": [...]}`, or per-kind arrays
//! `{"storage": [...], "vms": [...], "iam": [...], "databases": [...]}`.
//! Per-kind keys attach a kind hint for untagged entries; the normalizer
//! still lets an explicit type tag win.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::{AuditError, AuditResult};
use crate::types::ResourceKind;

/// A raw resource plus the kind hint its container position implied.
pub type RawEntry = (Value, Option<ResourceKind>);

const WRAPPER_KEYS: &[&str] = &["resources", "resource_changes"];

const KIND_KEYS: &[(&str, ResourceKind)] = &[
    ("storage", ResourceKind::Storage),
    ("vms", ResourceKind::VirtualMachine),
    ("iam", ResourceKind::IdentityPrincipal),
    ("databases", ResourceKind::Database),
];

/// Load and shape-check a collector output file.
pub fn load(path: &Path) -> AuditResult<Vec<RawEntry>> {
    if !path.exists() {
        return Err(AuditError::InputNotFound { path: path.display().to_string() });
    }
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| AuditError::InputMalformed(format!("invalid JSON: {}", e)))?;
    let entries = parse_container(value)?;
    info!(path = %path.display(), entries = entries.len(), "Loaded resource input");
    Ok(entries)
}

/// Unwrap any accepted container shape into raw entries.
pub fn parse_container(value: Value) -> AuditResult<Vec<RawEntry>> {
    match value {
        Value::Array(items) => Ok(items.into_iter().map(|v| (v, None)).collect()),
        Value::Object(mut obj) => {
            for key in WRAPPER_KEYS {
                match obj.remove(*key) {
                    Some(Value::Array(items)) => {
                        return Ok(items.into_iter().map(|v| (v, None)).collect());
                    }
                    Some(_) => {
                        return Err(AuditError::InputMalformed(format!(
                            "\"{}\" must be an array",
                            key
                        )));
                    }
                    None => {}
                }
            }

            let mut entries = Vec::new();
            let mut matched = false;
            for (key, kind) in KIND_KEYS {
                match obj.remove(*key) {
                    Some(Value::Array(items)) => {
                        matched = true;
                        entries.extend(items.into_iter().map(|v| (v, Some(*kind))));
                    }
                    Some(single @ Value::Object(_)) => {
                        // old collector builds emitted the storage record bare
                        matched = true;
                        entries.push((single, Some(*kind)));
                    }
                    Some(_) => {
                        return Err(AuditError::InputMalformed(format!(
                            "\"{}\" must be an array of resources",
                            key
                        )));
                    }
                    None => {}
                }
            }
            if matched {
                Ok(entries)
            } else {
                Err(AuditError::InputMalformed(
                    "unrecognized container shape: expected an array, \"resources\", \
                     \"resource_changes\", or per-kind arrays"
                        .into(),
                ))
            }
        }
        _ => Err(AuditError::InputMalformed("expected a JSON array or object".into())),
    }
}
