use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// A registered devotee as returned by `devotees/`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Devotee {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country_code: String,
    pub phone: String,
    pub nakshatra: String,
    pub created_at: DateTime<Utc>,
}

/// A submission that collided with an existing devotee.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DuplicateEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country_code: String,
    pub phone: String,
    pub nakshatra: String,
    pub created_at: DateTime<Utc>,
}

/// A submission that failed validation, kept with the reason.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct InvalidEntry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub nakshatra: String,
    #[serde(default)]
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Which holding area a pending entry lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryKind {
    Duplicate,
    Invalid,
}

impl EntryKind {
    /// Collection path segment, shared by the API and the console routes.
    pub fn slug(&self) -> &'static str {
        match self {
            EntryKind::Duplicate => "duplicates",
            EntryKind::Invalid => "invalids",
        }
    }

    pub fn bulk_delete_path(&self) -> &'static str {
        match self {
            EntryKind::Duplicate => "delete-all-duplicates/",
            EntryKind::Invalid => "delete-all-invalids/",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EntryKind::Duplicate => "Duplicate Entries",
            EntryKind::Invalid => "Invalid Entries",
        }
    }
}

/// Duplicate and invalid entries share one shape on the console side.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingEntry {
    pub id: i64,
    pub name: String,
    pub country_code: String,
    pub phone: String,
    pub nakshatra: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DuplicateEntry> for PendingEntry {
    fn from(entry: DuplicateEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            country_code: entry.country_code,
            phone: entry.phone,
            nakshatra: entry.nakshatra,
            reason: None,
            created_at: entry.created_at,
        }
    }
}

impl From<InvalidEntry> for PendingEntry {
    fn from(entry: InvalidEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            country_code: entry.country_code,
            phone: entry.phone,
            nakshatra: entry.nakshatra,
            reason: Some(entry.reason).filter(|reason| !reason.is_empty()),
            created_at: entry.created_at,
        }
    }
}

/// Body for creating, updating or converting a devotee.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NewDevotee {
    pub name: String,
    pub country_code: String,
    pub phone: String,
    pub nakshatra: String,
}

impl NewDevotee {
    /// Trim every field and upper-case name and nakshatra.
    pub fn normalized(name: &str, country_code: &str, phone: &str, nakshatra: &str) -> Self {
        Self {
            name: name.trim().to_uppercase(),
            country_code: country_code.trim().to_string(),
            phone: phone.trim().to_string(),
            nakshatra: nakshatra.trim().to_uppercase(),
        }
    }

    /// Required-field checks done before anything is sent.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() && self.phone.is_empty() {
            return Err(ApiError::Validation(
                "Name and Phone cannot be empty".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(ApiError::Validation("Please enter a name".to_string()));
        }
        if self.phone.is_empty() {
            return Err(ApiError::Validation(
                "Please enter phone number".to_string(),
            ));
        }
        if self.nakshatra.is_empty() {
            return Err(ApiError::Validation("Please select a Nakshatra".to_string()));
        }
        Ok(())
    }
}

/// Counts reported by `bulk-upload/`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct BulkUploadSummary {
    #[serde(default)]
    pub message: Option<String>,
    pub created: u64,
    pub duplicates: u64,
    pub invalid: u64,
}

impl fmt::Display for BulkUploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created: {}, Duplicates: {}, Invalid Rows: {}",
            self.created, self.duplicates, self.invalid
        )
    }
}

/// Reply from the bulk delete endpoints.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeleteSummary {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub deleted: Option<u64>,
}

impl DeleteSummary {
    pub fn describe(&self, fallback: &str) -> String {
        match (&self.message, self.deleted) {
            (Some(message), _) => message.clone(),
            (None, Some(count)) => format!("{count} records deleted"),
            (None, None) => fallback.to_string(),
        }
    }
}
