//! Domain logic for the admin trust boundary: session validity rules,
//! approval state machine, request-content hashing, and user-agent
//! classification. This crate performs no I/O.

pub mod approval;
pub mod error;
pub mod hashing;
pub mod session;
pub mod types;
pub mod user_agent;
