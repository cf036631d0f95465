//! Actor identity for role-gated workflow transitions.
//!
//! The identity collaborator supplies the acting user's role for every
//! transition request; the domain treats roles as opaque strings matched
//! against the transition table's permitted-role sets.

pub mod actor;
pub mod role;

pub use actor::Actor;
pub use role::Role;
