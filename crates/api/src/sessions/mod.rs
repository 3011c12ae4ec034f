//! Distributed session registry: storage over the TTL key-value tier
//! plus the lifecycle service consumed by the admin routes.

pub mod service;
pub mod store;

pub use service::{SessionContext, SessionService};
pub use store::SessionStore;
