//! The single authoritative definition of which status changes an item may
//! undergo, what each change must carry, and which items count as active.
//!
//! `status` is the lifecycle field. `type` only matters where it says
//! `claimed` or `archived`: views and guards then treat the item as such,
//! whatever `status` holds.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::LifecycleError;
use crate::models::{ClaimantInfo, FinderInfo, HistoryRecord, Id, Item, ItemStatus, ItemType};
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Report,
    MarkFound,
    Approve,
    Reject,
    Claim,
    Archive,
    Restore,
    Delete,
    Sweep,
}

impl TransitionKind {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionKind::Report => "report",
            TransitionKind::MarkFound => "mark_found",
            TransitionKind::Approve => "approve",
            TransitionKind::Reject => "reject",
            TransitionKind::Claim => "claim",
            TransitionKind::Archive => "archive",
            TransitionKind::Restore => "restore",
            TransitionKind::Delete => "delete",
            TransitionKind::Sweep => "sweep",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionKind::MarkFound => "mark as found",
            TransitionKind::Sweep => "sweep",
            other => other.as_str(),
        })
    }
}

/// A requested change to an existing item, with the data it must carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    MarkFound(FinderInfo),
    Approve,
    Reject,
    Claim { claimant: ClaimantInfo, reference_number: String },
    Archive,
    Restore,
    Delete,
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Transition::MarkFound(_) => TransitionKind::MarkFound,
            Transition::Approve => TransitionKind::Approve,
            Transition::Reject => TransitionKind::Reject,
            Transition::Claim { .. } => TransitionKind::Claim,
            Transition::Archive => TransitionKind::Archive,
            Transition::Restore => TransitionKind::Restore,
            Transition::Delete => TransitionKind::Delete,
        }
    }

    /// Status the item ends up in; `None` for permanent deletion.
    pub fn target(&self, item: &Item) -> Option<ItemStatus> {
        match self {
            Transition::MarkFound(_) => Some(ItemStatus::Found),
            Transition::Approve => Some(ItemStatus::Approved),
            Transition::Reject => Some(ItemStatus::Rejected),
            Transition::Claim { .. } => Some(ItemStatus::Claimed),
            Transition::Archive => Some(ItemStatus::Archived),
            Transition::Restore => Some(restore_target(item)),
            Transition::Delete => None,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Transition::MarkFound(_) => "marked as found",
            Transition::Approve => "approved",
            Transition::Reject => "rejected",
            Transition::Claim { .. } => "claimed",
            Transition::Archive => "archived",
            Transition::Restore => "restored",
            Transition::Delete => "deleted",
        }
    }
}

/// Status an archived item returns to when restored.
pub fn restore_target(item: &Item) -> ItemStatus {
    match item.status_before_archive {
        Some(prev) if prev != ItemStatus::Archived => prev,
        // archived through `type` only: the status never left its prior state
        _ if item.status != ItemStatus::Archived => item.status,
        _ => match item.item_type {
            ItemType::Lost => ItemStatus::Lost,
            ItemType::Found => ItemStatus::Found,
            _ => ItemStatus::Pending,
        },
    }
}

pub fn can_transition(from: ItemStatus, to: ItemStatus) -> bool {
    use ItemStatus::*;
    match (from, to) {
        (Lost, Found) => true,
        (Pending | Lost | Found, Approved) => true,
        (Pending, Rejected) => true,
        (Approved | Found | Lost, Claimed) => true,
        // archiving is idempotent; restore leaves archived for any prior state
        (_, Archived) | (Archived, _) => true,
        _ => false,
    }
}

/// Guards plus field validation, without touching the item.
pub fn check_transition(item: &Item, transition: &Transition, today: NaiveDate) -> Result<(), LifecycleError> {
    let from = lifecycle_status(item);
    let blocked = || LifecycleError::InvalidTransition { from, action: transition.kind() };
    let Some(target) = transition.target(item) else {
        return Ok(());
    };
    if matches!(transition, Transition::Restore) && from != ItemStatus::Archived {
        return Err(blocked());
    }
    if !can_transition(from, target) {
        return Err(blocked());
    }
    match transition {
        Transition::MarkFound(finder) => validate::finder(finder, today)?,
        Transition::Claim { claimant, .. } => validate::claimant(claimant)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Updated { item: Item, record: HistoryRecord },
    /// Nothing to do (archiving an archived item).
    Unchanged(Item),
    Removed,
}

/// Computes the item after `transition`. Used by the offline repository,
/// which plays the backend's role of authority of record.
pub fn apply_transition(item: &Item, transition: &Transition, now: DateTime<Utc>) -> Result<Applied, LifecycleError> {
    check_transition(item, transition, now.date_naive())?;
    let Some(target) = transition.target(item) else {
        return Ok(Applied::Removed);
    };
    if target == ItemStatus::Archived && is_archived(item) {
        return Ok(Applied::Unchanged(item.clone()));
    }

    let mut next = item.clone();
    let mut record = HistoryRecord {
        item_id: item.id,
        previous_status: Some(lifecycle_status(item)),
        new_status: target,
        change_reason: transition.reason().to_string(),
        timestamp: now,
        finder: None,
        claimant: None,
        reference_number: None,
    };
    match transition {
        Transition::MarkFound(f) => {
            next.item_type = ItemType::Found;
            next.finder_name = Some(f.finder_name.clone());
            next.finder_student_id = Some(f.finder_student_id.clone());
            next.finder_contact = Some(f.finder_contact.clone());
            next.found_date = Some(f.found_date);
            next.found_time = Some(f.found_time);
            record.finder = Some(f.clone());
        }
        Transition::Claim { claimant, reference_number } => {
            next.claimant_name = Some(claimant.claimant_name.clone());
            next.claimant_student_id = Some(claimant.claimant_student_id.clone());
            next.claimant_contact = claimant.claimant_contact.clone();
            next.reference_number = Some(reference_number.clone());
            next.claimed_at = Some(now);
            record.claimant = Some(claimant.clone());
            record.reference_number = Some(reference_number.clone());
        }
        Transition::Archive => {
            next.status_before_archive = Some(item.status);
            next.archived_at = Some(now);
        }
        Transition::Restore => {
            next.status_before_archive = None;
            next.archived_at = None;
            if next.item_type == ItemType::Archived {
                next.item_type = if target == ItemStatus::Lost { ItemType::Lost } else { ItemType::Found };
            }
        }
        Transition::Approve | Transition::Reject | Transition::Delete => {}
    }
    next.status = target;
    next.updated_at = Some(now);
    Ok(Applied::Updated { item: next, record })
}

// ---------------- views ----------------

pub fn is_archived(item: &Item) -> bool {
    item.status == ItemStatus::Archived || item.item_type == ItemType::Archived
}

pub fn is_claimed(item: &Item) -> bool {
    !is_archived(item) && (item.status == ItemStatus::Claimed || item.item_type == ItemType::Claimed)
}

/// Status the guards act on. An item the views list as archived or claimed
/// is treated as such even when only `type` says so.
pub fn lifecycle_status(item: &Item) -> ItemStatus {
    if is_archived(item) {
        ItemStatus::Archived
    } else if is_claimed(item) {
        ItemStatus::Claimed
    } else {
        item.status
    }
}

/// Neither claimed nor archived, in either field.
pub fn is_active(item: &Item) -> bool {
    !is_archived(item) && !is_claimed(item)
}

/// Lost/found side an active item is listed under.
pub fn listed_as(item: &Item) -> Option<ItemType> {
    match item.status {
        ItemStatus::Lost => Some(ItemType::Lost),
        ItemStatus::Found => Some(ItemType::Found),
        _ => match item.item_type {
            t @ (ItemType::Lost | ItemType::Found) => Some(t),
            _ => None,
        },
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ItemViews {
    pub active_lost: Vec<Item>,
    pub active_found: Vec<Item>,
    pub claimed: Vec<Item>,
    pub archived: Vec<Item>,
}

impl ItemViews {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        let mut v = ItemViews::default();
        for item in items {
            if is_archived(item) {
                v.archived.push(item.clone());
            } else if is_claimed(item) {
                v.claimed.push(item.clone());
            } else {
                match listed_as(item) {
                    Some(ItemType::Found) => v.active_found.push(item.clone()),
                    _ => v.active_lost.push(item.clone()),
                }
            }
        }
        // newest first
        v.active_lost.sort_by(|a, b| b.date_reported.cmp(&a.date_reported));
        v.active_found.sort_by(|a, b| b.date_reported.cmp(&a.date_reported));
        v.claimed.sort_by(|a, b| b.claimed_at.cmp(&a.claimed_at));
        v.archived.sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
        v
    }

    pub fn active(&self) -> impl Iterator<Item = &Item> {
        self.active_lost.iter().chain(self.active_found.iter())
    }
}

/// Items the age-based sweep would archive: not archived yet and idle for
/// at least `older_than`.
pub fn archive_candidates<'a>(items: impl IntoIterator<Item = &'a Item>, older_than: Duration, now: DateTime<Utc>) -> Vec<Id> {
    items
        .into_iter()
        .filter(|i| !is_archived(i) && now - i.last_activity() >= older_than)
        .map(|i| i.id)
        .collect()
}
