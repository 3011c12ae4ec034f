//! HTTP handlers, grouped by resource.

pub mod approvals;
pub mod sessions;
