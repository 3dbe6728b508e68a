//! The acting user of a request, passed explicitly to every record operation.

use serde::{Deserialize, Serialize};

use crate::auth::{User, UserID};

/// The privilege level of an [Actor].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Privilege {
    /// May only see and manage their own records.
    Ordinary,
    /// May see and manage every user's records and reassign ownership.
    Privileged,
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// The ID of the acting user.
    pub user_id: UserID,
    /// Whether the acting user has elevated rights.
    pub privilege: Privilege,
}

impl Actor {
    /// An actor without elevated rights.
    pub fn ordinary(user_id: UserID) -> Self {
        Self {
            user_id,
            privilege: Privilege::Ordinary,
        }
    }

    /// An administrator.
    pub fn privileged(user_id: UserID) -> Self {
        Self {
            user_id,
            privilege: Privilege::Privileged,
        }
    }

    /// Whether the actor may manage every user's records.
    pub fn is_privileged(&self) -> bool {
        self.privilege == Privilege::Privileged
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        if user.is_admin {
            Actor::privileged(user.id)
        } else {
            Actor::ordinary(user.id)
        }
    }
}
