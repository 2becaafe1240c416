//! Writes: complaint submission with related issues, announcements, reports, status changes.
//!
//! A failed embedding never loses a write. The row is stored without an embedding, stays out of
//! similarity results, and is picked up later by the backfill.

use serde::{Deserialize, Serialize};

use civic_domain::{
	principal::Principal,
	record::{Collection, ComplaintStatus, RecordRef, announcement_text},
	vector::EmbeddingVector,
	visibility::VisibilityPredicate,
};
use civic_storage::models::{NewAnnouncement, NewComplaint, NewReport, Record};

use crate::{CivicService, Error, RankedItem, RecordView, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitComplaintRequest {
	pub ward: i32,
	pub category: String,
	pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitComplaintResponse {
	pub complaint: RecordView,
	pub embedded: bool,
	pub related: Vec<RankedItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddAnnouncementRequest {
	/// Omit for a city-wide announcement.
	#[serde(default)]
	pub ward: Option<i32>,
	pub title: String,
	pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddReportRequest {
	pub ward: i32,
	pub report_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddRecordResponse {
	pub record: RecordView,
	pub embedded: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
	pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatusResponse {
	pub complaint: RecordView,
}

impl CivicService {
	/// Stores a complaint and returns the most similar complaints in its ward.
	pub async fn submit_with_related(
		&self,
		principal: &Principal,
		req: SubmitComplaintRequest,
	) -> Result<SubmitComplaintResponse> {
		let scope = self.visibility(principal)?.scope(Collection::Complaints)?;
		let new = NewComplaint {
			user_id: principal.user_id,
			ward: req.ward,
			category: required_text("category", &req.category)?,
			description: required_text("description", &req.description)?,
		};
		let embedding = self.embed_for_write(Collection::Complaints, &new.description).await;
		let complaint = self.store.insert_complaint(&new, embedding.as_ref()).await?;

		tracing::info!(
			record_id = complaint.id,
			ward = complaint.ward,
			embedded = embedding.is_some(),
			"Complaint submitted."
		);

		let related = match &embedding {
			Some(vector) => {
				let ranked = self
					.find_related_to_vector(
						vector,
						complaint.ward,
						Some(complaint.id),
						Some(&scope),
						self.cfg.related.internal_cap,
					)
					.await?;
				let mut items = self.ranked_items(Collection::Complaints, &ranked).await?;

				items.truncate(self.cfg.related.shown as usize);

				items
			},
			None => Vec::new(),
		};

		Ok(SubmitComplaintResponse {
			complaint: Record::Complaint(complaint).into(),
			embedded: embedding.is_some(),
			related,
		})
	}

	/// Admin only.
	pub async fn add_announcement(
		&self,
		principal: &Principal,
		req: AddAnnouncementRequest,
	) -> Result<AddRecordResponse> {
		let visibility = self.visibility(principal)?;

		if !matches!(visibility, VisibilityPredicate::Unrestricted) {
			return Err(Error::access_denied("Only admins may publish announcements."));
		}

		let new = NewAnnouncement {
			ward: req.ward,
			title: required_text("title", &req.title)?,
			body: required_text("body", &req.body)?,
		};
		let embedding = self
			.embed_for_write(Collection::Announcements, &announcement_text(&new.title, &new.body))
			.await;
		let announcement = self.store.insert_announcement(&new, embedding.as_ref()).await?;

		tracing::info!(
			record_id = announcement.id,
			ward = announcement.ward,
			embedded = embedding.is_some(),
			"Announcement published."
		);

		Ok(AddRecordResponse {
			record: Record::Announcement(announcement).into(),
			embedded: embedding.is_some(),
		})
	}

	/// Officers file for their own ward; admins for any.
	pub async fn add_report(
		&self,
		principal: &Principal,
		req: AddReportRequest,
	) -> Result<AddRecordResponse> {
		match self.visibility(principal)? {
			VisibilityPredicate::Unrestricted => {},
			VisibilityPredicate::Ward { ward } if ward == req.ward => {},
			VisibilityPredicate::Ward { .. } => {
				return Err(Error::access_denied(
					"Officers may only file reports for their own ward.",
				));
			},
			VisibilityPredicate::Citizen { .. } =>
				return Err(Error::access_denied("Citizens may not file reports.")),
		}

		let new = NewReport {
			officer_id: principal.user_id,
			ward: req.ward,
			report_text: required_text("report_text", &req.report_text)?,
		};
		let embedding = self.embed_for_write(Collection::Reports, &new.report_text).await;
		let report = self.store.insert_report(&new, embedding.as_ref()).await?;

		tracing::info!(
			record_id = report.id,
			ward = report.ward,
			embedded = embedding.is_some(),
			"Report filed."
		);

		Ok(AddRecordResponse {
			record: Record::Report(report).into(),
			embedded: embedding.is_some(),
		})
	}

	/// Officers may change complaints in their own ward; admins any. Embeddings are untouched.
	pub async fn update_status(
		&self,
		principal: &Principal,
		complaint_id: i64,
		req: UpdateStatusRequest,
	) -> Result<UpdateStatusResponse> {
		let status: ComplaintStatus = req.status.parse().map_err(Error::invalid_parameter)?;

		match self.visibility(principal)? {
			VisibilityPredicate::Unrestricted => {},
			VisibilityPredicate::Ward { ward } => {
				let reference = RecordRef { collection: Collection::Complaints, id: complaint_id };
				let record = self.store.get(reference).await?.ok_or_else(|| {
					Error::RecordNotFound { message: format!("Complaint {complaint_id} not found.") }
				})?;

				if record.ward() != Some(ward) {
					return Err(Error::access_denied(
						"Officers may only update complaints in their own ward.",
					));
				}
			},
			VisibilityPredicate::Citizen { .. } =>
				return Err(Error::access_denied("Citizens may not change complaint status.")),
		}

		let complaint = self.store.set_complaint_status(complaint_id, status).await?;

		tracing::info!(
			record_id = complaint.id,
			status = status.as_str(),
			"Complaint status updated."
		);

		Ok(UpdateStatusResponse { complaint: Record::Complaint(complaint).into() })
	}

	async fn embed_for_write(&self, collection: Collection, text: &str) -> Option<EmbeddingVector> {
		match self.vectorizer.embed(text).await {
			Ok(vector) => Some(vector),
			Err(err) => {
				tracing::warn!(
					%collection,
					error = %err,
					"Embedding failed. Storing the record without an embedding."
				);

				None
			},
		}
	}
}

fn required_text(field: &str, value: &str) -> Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(Error::invalid_parameter(format!("{field} must not be empty.")));
	}

	Ok(trimmed.to_string())
}
