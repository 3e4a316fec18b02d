//! Resource Normalizer — raw collector JSON → canonical [`Resource`].
//!
//! Kind determination is a two-stage policy: an explicit `type` tag (short
//! form or fully-qualified provider string) always wins; a loader-supplied
//! hint from per-kind container arrays comes next; structural sniffing of
//! legacy untagged records is the last resort. Records matching none of the
//! three are outside the audited surface and are dropped without error.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::resolver;
use crate::types::ResourceKind;

/// Nested domain objects whose fields are folded into the attribute bag.
/// Top-level keys always win; `properties`/`values` stay nested and are
/// reached through the resolver.
const MERGE_SUBOBJECTS: &[&str] = &["account", "blobService", "fileService"];

/// Canonical resource: identity plus a merged attribute bag the evaluator
/// resolves control fields against.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub group: String,
    pub kind: ResourceKind,
    pub attributes: Map<String, Value>,
}

/// Outcome of normalizing one raw record.
#[derive(Debug)]
pub enum Normalized {
    Canonical(Resource),
    /// No type tag, hint, or recognizable shape. Not an error.
    UnknownKind,
    /// Neither id nor name resolvable; must never be silently evaluated.
    Unidentifiable,
}

pub fn normalize(raw: &Value, hint: Option<ResourceKind>) -> Normalized {
    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            warn!("Skipping non-object resource entry");
            return Normalized::Unidentifiable;
        }
    };

    let kind = match explicit_kind(obj).or(hint).or_else(|| sniff_kind(obj)) {
        Some(k) => k,
        None => {
            debug!("Skipping resource with unrecognized kind");
            return Normalized::UnknownKind;
        }
    };

    let attributes = merge_attributes(obj);
    let id = string_attr(&attributes, &["id"]);
    let name = string_attr(&attributes, &["name"]);
    if id.is_empty() && name.is_empty() {
        warn!(kind = ?kind, "Dropping resource with neither id nor name");
        return Normalized::Unidentifiable;
    }
    let group = resource_group_of(&id);

    Normalized::Canonical(Resource { id, name, group, kind, attributes })
}

/// Stage 1: explicit `type` tag, top-level or under `properties`.
fn explicit_kind(obj: &Map<String, Value>) -> Option<ResourceKind> {
    resolver::resolve(obj, &["type"])
        .and_then(Value::as_str)
        .and_then(kind_from_tag)
}

/// Maps both short collector tags and fully-qualified provider type strings
/// (matched case-insensitively by substring) onto a [`ResourceKind`].
fn kind_from_tag(tag: &str) -> Option<ResourceKind> {
    let t = tag.to_ascii_lowercase();
    match t.as_str() {
        "storage" => return Some(ResourceKind::Storage),
        "vm" => return Some(ResourceKind::VirtualMachine),
        "iam" => return Some(ResourceKind::IdentityPrincipal),
        "db" => return Some(ResourceKind::Database),
        _ => {}
    }
    if t.contains("microsoft.storage") || t.contains("storageaccounts") || t.contains("storage_account") {
        Some(ResourceKind::Storage)
    } else if t.contains("microsoft.compute") || t.contains("virtualmachines") || t.contains("virtual_machine") {
        Some(ResourceKind::VirtualMachine)
    } else if t.contains("microsoft.authorization") || t.contains("roleassignments") || t.contains("aaduser") {
        Some(ResourceKind::IdentityPrincipal)
    } else if t.contains("microsoft.sql") || t.contains("databases") {
        Some(ResourceKind::Database)
    } else {
        None
    }
}

/// Stage 2: structural sniffing for legacy untagged producer formats.
fn sniff_kind(obj: &Map<String, Value>) -> Option<ResourceKind> {
    if obj.contains_key("account") && obj.contains_key("blobService") {
        Some(ResourceKind::Storage)
    } else if obj.contains_key("osProfile") || obj.contains_key("latestModelApplied") {
        Some(ResourceKind::VirtualMachine)
    } else if obj.contains_key("userType") || obj.contains_key("mfaEnabled") {
        Some(ResourceKind::IdentityPrincipal)
    } else if obj.contains_key("encryptionProtector")
        || obj.contains_key("containmentState")
        || obj.contains_key("auditSettings")
    {
        Some(ResourceKind::Database)
    } else {
        None
    }
}

/// Fold the known domain sub-objects into one bag, top level first.
fn merge_attributes(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut bag = obj.clone();
    for sub in MERGE_SUBOBJECTS {
        if let Some(Value::Object(inner)) = obj.get(*sub) {
            for (k, v) in inner {
                bag.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
    }
    bag
}

fn string_attr(bag: &Map<String, Value>, candidates: &[&str]) -> String {
    resolver::resolve(bag, candidates)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Extract the resource group from an ARM-style id path: the segment
/// following `resourceGroups` (or the short segment `rg` older collector
/// builds emitted), else empty.
pub fn resource_group_of(id: &str) -> String {
    let mut segments = id.split('/').filter(|s| !s.is_empty());
    while let Some(seg) = segments.next() {
        if seg.eq_ignore_ascii_case("resourcegroups") || seg.eq_ignore_ascii_case("rg") {
            return segments.next().unwrap_or("").to_string();
        }
    }
    String::new()
}

/// Last path segment of a resource id, used as the account/resource name
/// when remediation needs a sub-resource target.
pub fn resource_name_of(id: &str) -> String {
    id.split('/').filter(|s| !s.is_empty()).last().unwrap_or("").to_string()
}
