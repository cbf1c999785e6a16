use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Storage format of `added_at`: ISO-8601, second precision, no offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn now_timestamp() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    // stored and in-memory values must agree
    now.with_nanosecond(0).unwrap_or(now)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub path: String,
    pub size_bytes: u64,
    pub format: String,
    pub added_at: NaiveDateTime,
    pub note: String,
}

impl Book {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn file_exists(&self) -> bool {
        Path::new(&self.path).exists()
    }
}

/// A record before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub path: String,
    pub size_bytes: u64,
    pub format: String,
    pub added_at: NaiveDateTime,
    pub note: String,
}

/// Full replacement of the user-editable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookUpdate {
    pub title: String,
    pub author: String,
    pub path: String,
    pub note: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    TitleAsc,
    AddedDesc,
    AddedAsc,
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TitleAsc => write!(f, "title_asc"),
            Self::AddedDesc => write!(f, "added_desc"),
            Self::AddedAsc => write!(f, "added_asc"),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title_asc" => Ok(Self::TitleAsc),
            "added_desc" => Ok(Self::AddedDesc),
            "added_asc" => Ok(Self::AddedAsc),
            _ => Err(format!("unknown sort key: {s}")),
        }
    }
}
