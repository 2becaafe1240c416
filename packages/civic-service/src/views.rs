use serde::{Serialize, Serializer, ser::Error as _};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use civic_domain::ranking::RankedResult;
use civic_storage::models::Record;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordView {
	Complaint {
		id: i64,
		user_id: i64,
		ward: i32,
		category: String,
		description: String,
		status: String,
		#[serde(serialize_with = "rfc3339")]
		created_at: OffsetDateTime,
	},
	Announcement {
		id: i64,
		ward: Option<i32>,
		title: String,
		body: String,
		#[serde(serialize_with = "rfc3339")]
		created_at: OffsetDateTime,
	},
	Report {
		id: i64,
		officer_id: i64,
		ward: i32,
		report_text: String,
		#[serde(serialize_with = "rfc3339")]
		created_at: OffsetDateTime,
	},
}
impl RecordView {
	pub fn id(&self) -> i64 {
		match self {
			Self::Complaint { id, .. } | Self::Announcement { id, .. } | Self::Report { id, .. } =>
				*id,
		}
	}
}
impl From<Record> for RecordView {
	fn from(record: Record) -> Self {
		match record {
			Record::Complaint(row) => Self::Complaint {
				id: row.id,
				user_id: row.user_id,
				ward: row.ward,
				category: row.category,
				description: row.description,
				status: row.status,
				created_at: row.created_at,
			},
			Record::Announcement(row) => Self::Announcement {
				id: row.id,
				ward: row.ward,
				title: row.title,
				body: row.body,
				created_at: row.created_at,
			},
			Record::Report(row) => Self::Report {
				id: row.id,
				officer_id: row.officer_id,
				ward: row.ward,
				report_text: row.report_text,
				created_at: row.created_at,
			},
		}
	}
}

/// A ranked result joined with its record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
	pub rank: u32,
	pub score: f32,
	pub record: RecordView,
}
impl RankedItem {
	pub(crate) fn new(ranked: &RankedResult, record: Record) -> Self {
		Self { rank: ranked.rank, score: ranked.score, record: record.into() }
	}
}

fn rfc3339<S>(at: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&at.format(&Rfc3339).map_err(S::Error::custom)?)
}
