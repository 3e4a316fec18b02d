//! Shared types for the audit pipeline.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Severity { Low, Medium, High, Critical }

/// Canonical resource families the control catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ResourceKind { Storage, VirtualMachine, IdentityPrincipal, Database }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CheckStatus { Pass, Fail }

/// Operational alert raised while an audit run progresses (dropped resources,
/// predicate evaluation errors). Not part of the report itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditAlert {
    pub timestamp: i64,
    pub severity: Severity,
    pub component: String,
    pub title: String,
    pub details: String,
}
