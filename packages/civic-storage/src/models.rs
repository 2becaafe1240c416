use time::OffsetDateTime;

use civic_domain::{
	filter::FilterExpr,
	record::{Collection, RecordMeta, RecordRef, announcement_text},
	vector::EmbeddingVector,
};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Complaint {
	pub id: i64,
	pub user_id: i64,
	pub ward: i32,
	pub category: String,
	pub description: String,
	pub status: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Announcement {
	pub id: i64,
	/// `None` means city-wide.
	pub ward: Option<i32>,
	pub title: String,
	pub body: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Report {
	pub id: i64,
	pub officer_id: i64,
	pub ward: i32,
	pub report_text: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
	Complaint(Complaint),
	Announcement(Announcement),
	Report(Report),
}
impl Record {
	pub fn collection(&self) -> Collection {
		match self {
			Self::Complaint(_) => Collection::Complaints,
			Self::Announcement(_) => Collection::Announcements,
			Self::Report(_) => Collection::Reports,
		}
	}

	pub fn id(&self) -> i64 {
		match self {
			Self::Complaint(row) => row.id,
			Self::Announcement(row) => row.id,
			Self::Report(row) => row.id,
		}
	}

	pub fn reference(&self) -> RecordRef {
		RecordRef { collection: self.collection(), id: self.id() }
	}

	pub fn ward(&self) -> Option<i32> {
		match self {
			Self::Complaint(row) => Some(row.ward),
			Self::Announcement(row) => row.ward,
			Self::Report(row) => Some(row.ward),
		}
	}

	pub fn created_at(&self) -> OffsetDateTime {
		match self {
			Self::Complaint(row) => row.created_at,
			Self::Announcement(row) => row.created_at,
			Self::Report(row) => row.created_at,
		}
	}

	/// The columns visibility filters are evaluated against.
	pub fn meta(&self) -> RecordMeta {
		match self {
			Self::Complaint(row) => RecordMeta {
				id: row.id,
				ward: Some(row.ward),
				author_id: Some(row.user_id),
				status: Some(row.status.clone()),
				created_at: row.created_at,
			},
			Self::Announcement(row) => RecordMeta {
				id: row.id,
				ward: row.ward,
				author_id: None,
				status: None,
				created_at: row.created_at,
			},
			Self::Report(row) => RecordMeta {
				id: row.id,
				ward: Some(row.ward),
				author_id: Some(row.officer_id),
				status: None,
				created_at: row.created_at,
			},
		}
	}

	/// The text the record's embedding is computed from.
	pub fn embedding_text(&self) -> String {
		match self {
			Self::Complaint(row) => row.description.clone(),
			Self::Announcement(row) => announcement_text(&row.title, &row.body),
			Self::Report(row) => row.report_text.clone(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
	pub user_id: i64,
	pub ward: i32,
	pub category: String,
	pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewAnnouncement {
	pub ward: Option<i32>,
	pub title: String,
	pub body: String,
}

#[derive(Debug, Clone)]
pub struct NewReport {
	pub officer_id: i64,
	pub ward: i32,
	pub report_text: String,
}

/// One nearest-neighbour request against a single collection.
#[derive(Debug, Clone, Copy)]
pub struct NearestQuery<'a> {
	pub collection: Collection,
	pub vector: &'a EmbeddingVector,
	pub filter: &'a FilterExpr,
	pub limit: u32,
}
