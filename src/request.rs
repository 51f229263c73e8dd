//! Maps lifecycle actions onto the backend's request shapes and reads its
//! `{success, message, ...}` envelopes back.
//!
//! Routes (relative to the configured API base):
//!
//! | action | request |
//! |---|---|
//! | list items | `GET /items` |
//! | history | `GET /items/{id}/history` |
//! | report | `POST /items` |
//! | mark found / approve / reject / claim | `PUT /items/{id}` |
//! | archive | `POST /items/{id}/archive` |
//! | restore | `POST /items/{id}/restore` |
//! | delete | `DELETE /items/{id}` |
//! | archive sweep | `POST /items/archive-sweep` |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lifecycle::Transition;
use crate::models::{ClaimantInfo, FinderInfo, Id, Item, ItemStatus, ItemType, NewItemReport};
use crate::repo::RepoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestSpec {
    fn new(method: Method, path: String) -> Self {
        Self { method, path, body: None }
    }

    fn json<T: Serialize>(mut self, body: &T) -> Result<Self, RepoError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| RepoError::Decode(e.to_string()))?);
        Ok(self)
    }

    pub fn list_items() -> Self {
        Self::new(Method::Get, "/items".into())
    }

    pub fn history(id: Id) -> Self {
        Self::new(Method::Get, format!("/items/{id}/history"))
    }

    pub fn create(report: &NewItemReport) -> Result<Self, RepoError> {
        Self::new(Method::Post, "/items".into()).json(report)
    }

    pub fn update(id: Id, update: &ItemUpdate) -> Result<Self, RepoError> {
        Self::new(Method::Put, format!("/items/{id}")).json(update)
    }

    pub fn archive(id: Id) -> Self {
        Self::new(Method::Post, format!("/items/{id}/archive"))
    }

    pub fn restore(id: Id) -> Self {
        Self::new(Method::Post, format!("/items/{id}/restore"))
    }

    pub fn delete(id: Id) -> Self {
        Self::new(Method::Delete, format!("/items/{id}"))
    }

    pub fn archive_sweep(older_than_days: i64) -> Result<Self, RepoError> {
        Self::new(Method::Post, "/items/archive-sweep".into()).json(&serde_json::json!({ "older_than_days": older_than_days }))
    }
}

/// Body of `PUT /items/{id}`: the new status plus the snapshot that must
/// accompany it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub status: ItemStatus,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub change_reason: String,
    #[serde(flatten)]
    pub finder: Option<FinderInfo>,
    #[serde(flatten)]
    pub claimant: Option<ClaimantInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
}

impl ItemUpdate {
    /// Reverse mapping used by the offline repository.
    pub fn into_transition(self) -> Result<Transition, RepoError> {
        let missing = |what: &str| RepoError::Rejected(format!("{what} details are required"));
        Ok(match self.status {
            ItemStatus::Found => Transition::MarkFound(self.finder.ok_or_else(|| missing("finder"))?),
            ItemStatus::Approved => Transition::Approve,
            ItemStatus::Rejected => Transition::Reject,
            ItemStatus::Claimed => Transition::Claim {
                claimant: self.claimant.ok_or_else(|| missing("claimant"))?,
                reference_number: self.reference_number.ok_or_else(|| missing("reference number"))?,
            },
            other => return Err(RepoError::Rejected(format!("status cannot be set to {other} directly"))),
        })
    }
}

/// One backend call per transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionRequest {
    Update(ItemUpdate),
    Archive,
    Restore,
    Delete,
}

impl TransitionRequest {
    pub fn for_transition(item: &Item, transition: &Transition) -> Self {
        let update = |status, item_type, finder, claimant, reference_number| {
            TransitionRequest::Update(ItemUpdate {
                status,
                item_type,
                change_reason: transition.reason().to_string(),
                finder,
                claimant,
                reference_number,
            })
        };
        match transition {
            Transition::MarkFound(f) => update(ItemStatus::Found, ItemType::Found, Some(f.clone()), None, None),
            Transition::Approve => update(ItemStatus::Approved, item.item_type, None, None, None),
            Transition::Reject => update(ItemStatus::Rejected, item.item_type, None, None, None),
            Transition::Claim { claimant, reference_number } => update(
                ItemStatus::Claimed,
                item.item_type,
                None,
                Some(claimant.clone()),
                Some(reference_number.clone()),
            ),
            Transition::Archive => TransitionRequest::Archive,
            Transition::Restore => TransitionRequest::Restore,
            Transition::Delete => TransitionRequest::Delete,
        }
    }

    pub fn spec(&self, id: Id) -> Result<RequestSpec, RepoError> {
        match self {
            TransitionRequest::Update(u) => RequestSpec::update(id, u),
            TransitionRequest::Archive => Ok(RequestSpec::archive(id)),
            TransitionRequest::Restore => Ok(RequestSpec::restore(id)),
            TransitionRequest::Delete => Ok(RequestSpec::delete(id)),
        }
    }
}

/// `{ "success": bool, "message"?: string, ...payload }`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Envelope {
    pub fn take<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, RepoError> {
        let value = self
            .data
            .remove(key)
            .ok_or_else(|| RepoError::Decode(format!("response is missing '{key}'")))?;
        serde_json::from_value(value).map_err(|e| RepoError::Decode(format!("bad '{key}' in response: {e}")))
    }
}

/// Reads a response body. Anything but `success: true` is a rejection whose
/// message is passed through verbatim.
pub fn interpret(status: u16, body: &[u8]) -> Result<Envelope, RepoError> {
    let http_ok = (200..300).contains(&status);
    match serde_json::from_slice::<Envelope>(body) {
        Ok(env) if env.success && http_ok => Ok(env),
        Ok(env) if !env.success => Err(RepoError::Rejected(
            env.message.unwrap_or_else(|| format!("request failed (HTTP {status})")),
        )),
        Ok(_) => Err(RepoError::Rejected(format!("request failed (HTTP {status})"))),
        Err(_) if status == 404 => Err(RepoError::Rejected("item not found".into())),
        Err(_) if !http_ok => Err(RepoError::Rejected(format!("request failed (HTTP {status})"))),
        Err(e) => Err(RepoError::Decode(format!("unreadable response: {e}"))),
    }
}
