//! Dual-control approval workflow for high-risk admin actions.

pub mod service;

pub use service::{ApprovalError, ApprovalService};
