use std::time::Duration;

use crate::actor::Role;
use crate::lifecycle::TransitionKind;
use crate::models::{Id, ItemStatus};
use crate::repo::RepoError;

/// Human-readable reason a value failed a validator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Reason(pub String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: Reason,
}

/// Everything that can stop a lifecycle action. Every variant leaves the
/// item's last confirmed state untouched.
#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot {action} an item that is {from}")]
    InvalidTransition { from: ItemStatus, action: TransitionKind },
    #[error("{role} accounts may not {action} items")]
    Forbidden { role: Role, action: TransitionKind },
    #[error("item {0} is not loaded; refresh and try again")]
    UnknownItem(Id),
    #[error("item {0} already has a change in progress")]
    Busy(Id),
    /// Backend business-rule failure; carries its message verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("network error, please try again ({0})")]
    Network(String),
    #[error("the server did not answer within {0:?}; please try again")]
    Timeout(Duration),
}

impl LifecycleError {
    /// Transport-level failures the user can simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifecycleError::Network(_) | LifecycleError::Timeout(_) | LifecycleError::Busy(_))
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            LifecycleError::Validation(_) => "invalid",
            LifecycleError::InvalidTransition { .. } | LifecycleError::Forbidden { .. } | LifecycleError::UnknownItem(_) => "blocked",
            LifecycleError::Busy(_) => "busy",
            LifecycleError::Rejected(_) => "rejected",
            LifecycleError::Network(_) | LifecycleError::Timeout(_) => "network",
        }
    }
}

impl From<RepoError> for LifecycleError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Rejected(msg) => LifecycleError::Rejected(msg),
            RepoError::NotFound(id) => LifecycleError::Rejected(format!("item {id} no longer exists")),
            RepoError::Timeout(d) => LifecycleError::Timeout(d),
            RepoError::Transport(msg) | RepoError::Decode(msg) => LifecycleError::Network(msg),
        }
    }
}
