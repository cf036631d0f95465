use serde::{Deserialize, Serialize};

use procureflow_core::UserId;

use crate::Role;

/// The acting identity carried on every workflow command.
///
/// Construction is decoupled from storage and transport: the identity
/// collaborator derives this from its session/claims however it likes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}
