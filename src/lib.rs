//! # Driftaudit — Cloud Resource Compliance Drift Auditor
//!
//! Evaluates collected cloud-resource JSON (storage accounts, virtual
//! machines, identity principals, databases) against a fixed catalog of
//! compliance controls (CIS Azure Foundations §10, PCI DSS) and emits:
//! - a structured audit report: one Pass/Fail row per (resource, applicable
//!   control) pair, each carrying the evidence value that was inspected
//! - an advisory remediation script mapping failed controls to idempotent
//!   corrective commands
//!
//! Pipeline: raw JSON → [`loader`] → [`normalizer`] (via [`resolver`]) →
//! [`evaluator`] (consulting [`registry`]) → [`report`] rows →
//! [`remediation`]. Everything between load and save is a pure in-memory
//! transform; nothing here mutates live infrastructure.

pub mod error;
pub mod evaluator;
pub mod loader;
pub mod normalizer;
pub mod registry;
pub mod remediation;
pub mod report;
pub mod resolver;
pub mod types;

pub use error::{AuditError, AuditResult};
pub use evaluator::{evaluate, AuditEngine, AuditSummary};
pub use normalizer::Resource;
pub use registry::ControlRegistry;
pub use remediation::RemediationAction;
pub use report::CheckResult;
pub use types::{CheckStatus, ResourceKind, Severity};
