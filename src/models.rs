use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// Backend-assigned identity
pub type Id = i64;

/// Lifecycle state of an item. This is the authoritative field; `ItemType`
/// only records what kind of report was filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
    Lost,
    Found,
    Claimed,
    Archived,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 7] = [
        ItemStatus::Pending,
        ItemStatus::Approved,
        ItemStatus::Rejected,
        ItemStatus::Lost,
        ItemStatus::Found,
        ItemStatus::Claimed,
        ItemStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Lost => "lost",
            ItemStatus::Found => "found",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    kind: &'static str,
    value: String,
}

impl FromStr for ItemStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ItemStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel { kind: "status", value: s.to_string() })
    }
}

impl TryFrom<String> for ItemStatus {
    type Error = UnknownLabel;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Report kind. Backends have been seen writing `claimed`/`archived` here
/// too, so those decode instead of failing the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ItemType {
    Lost,
    Found,
    Claimed,
    Archived,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Lost => "lost",
            ItemType::Found => "found",
            ItemType::Claimed => "claimed",
            ItemType::Archived => "archived",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [ItemType::Lost, ItemType::Found, ItemType::Claimed, ItemType::Archived]
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel { kind: "type", value: s.to_string() })
    }
}

impl TryFrom<String> for ItemType {
    type Error = UnknownLabel;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderInfo {
    pub finder_name: String,
    pub finder_student_id: String,
    pub finder_contact: String,
    pub found_date: NaiveDate,
    pub found_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantInfo {
    pub claimant_name: String,
    pub claimant_student_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimant_contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub status: ItemStatus,
    pub item_name: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub reporter_name: String,
    pub student_id: String,
    pub contact_info: String,
    // finder snapshot (lost -> found)
    #[serde(default)]
    pub finder_name: Option<String>,
    #[serde(default)]
    pub finder_student_id: Option<String>,
    #[serde(default)]
    pub finder_contact: Option<String>,
    #[serde(default)]
    pub found_date: Option<NaiveDate>,
    #[serde(default)]
    pub found_time: Option<NaiveTime>,
    // claimant snapshot (-> claimed)
    #[serde(default)]
    pub claimant_name: Option<String>,
    #[serde(default)]
    pub claimant_student_id: Option<String>,
    #[serde(default)]
    pub claimant_contact: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    pub date_reported: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_before_archive: Option<ItemStatus>,
}

impl Item {
    pub fn finder(&self) -> Option<FinderInfo> {
        Some(FinderInfo {
            finder_name: self.finder_name.clone()?,
            finder_student_id: self.finder_student_id.clone()?,
            finder_contact: self.finder_contact.clone().unwrap_or_default(),
            found_date: self.found_date?,
            found_time: self.found_time?,
        })
    }

    /// Latest moment anything happened to this item.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [self.updated_at, self.claimed_at]
            .into_iter()
            .flatten()
            .fold(self.date_reported, |latest, t| latest.max(t))
    }
}

/// One entry of an item's append-only change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub item_id: Id,
    #[serde(rename = "previous_type", default)]
    pub previous_status: Option<ItemStatus>,
    #[serde(rename = "new_type")]
    pub new_status: ItemStatus,
    pub change_reason: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finder: Option<FinderInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimant: Option<ClaimantInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
}

pub const LOCATIONS: &[&str] = &[
    "LIBRARY",
    "CANTEEN",
    "GYMNASIUM",
    "CHAPEL",
    "AUDITORIUM",
    "REGISTRAR",
    "CLINIC",
    "COMPUTER LAB",
    "SCIENCE BUILDING",
    "ENGINEERING BUILDING",
    "PARKING LOT",
    "MAIN GATE",
];

/// Where an item was lost or found: a campus location from [`LOCATIONS`]
/// or free text under "Others".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Listed(&'static str),
    Others(String),
}

impl Location {
    /// Resolves user input; anything not on the list becomes `Others`.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match LOCATIONS.iter().find(|l| l.eq_ignore_ascii_case(input)) {
            Some(l) => Location::Listed(l),
            None => Location::Others(input.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Location::Listed(l) => l,
            Location::Others(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItemReport {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub item_name: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub reporter_name: String,
    pub student_id: String,
    pub contact_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_type_decode_any_case() {
        for raw in ["\"CLAIMED\"", "\"Claimed\"", "\"claimed\""] {
            let st: ItemStatus = serde_json::from_str(raw).unwrap();
            assert_eq!(st, ItemStatus::Claimed);
            let ty: ItemType = serde_json::from_str(raw).unwrap();
            assert_eq!(ty, ItemType::Claimed);
        }
        assert_eq!(serde_json::to_string(&ItemStatus::Archived).unwrap(), "\"archived\"");
        assert!(serde_json::from_str::<ItemStatus>("\"misplaced\"").is_err());
    }

    #[test]
    fn location_resolution() {
        assert_eq!(Location::parse("library"), Location::Listed("LIBRARY"));
        assert_eq!(Location::parse(" Computer Lab "), Location::Listed("COMPUTER LAB"));
        assert_eq!(Location::parse("Bench near the fountain"), Location::Others("Bench near the fountain".into()));
    }
}
