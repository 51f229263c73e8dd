use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lifecycle::TransitionKind;

/// Who is driving the lifecycle action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reporter,
    Staff,
    Admin,
}

impl Role {
    pub fn permits(self, action: TransitionKind) -> bool {
        use TransitionKind::*;
        match self {
            Role::Reporter => matches!(action, Report),
            Role::Staff => !matches!(action, Delete),
            Role::Admin => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Reporter => "reporter",
            Role::Staff => "staff",
            Role::Admin => "admin",
        })
    }
}
