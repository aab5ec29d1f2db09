//! Adapters binding external collaborators to the domain ports.

pub mod unconfigured;

pub use unconfigured::{UnconfiguredAuditService, UnconfiguredClarifier, UnconfiguredPlanner};
