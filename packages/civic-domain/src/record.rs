use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
	Complaints,
	Announcements,
	Reports,
}
impl Collection {
	pub const ALL: [Self; 3] = [Self::Complaints, Self::Announcements, Self::Reports];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Complaints => "complaints",
			Self::Announcements => "announcements",
			Self::Reports => "reports",
		}
	}
}
impl Display for Collection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
	Pending,
	InProgress,
	Resolved,
	Rejected,
}
impl ComplaintStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::InProgress => "in_progress",
			Self::Resolved => "resolved",
			Self::Rejected => "rejected",
		}
	}
}
impl FromStr for ComplaintStatus {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"in_progress" => Ok(Self::InProgress),
			"resolved" => Ok(Self::Resolved),
			"rejected" => Ok(Self::Rejected),
			other => Err(format!("Unknown complaint status {other:?}.")),
		}
	}
}

/// Identifies one embeddable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
	pub collection: Collection,
	pub id: i64,
}

/// The scalar columns visibility filters look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
	pub id: i64,
	pub ward: Option<i32>,
	pub author_id: Option<i64>,
	pub status: Option<String>,
	pub created_at: OffsetDateTime,
}

/// Text fed to the embedding model for an announcement.
pub fn announcement_text(title: &str, body: &str) -> String {
	format!("{}. {}", title.trim(), body.trim())
}
