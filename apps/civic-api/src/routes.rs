use axum::{
	Json, Router,
	extract::{FromRequestParts, Path, State},
	http::{HeaderMap, StatusCode, header, request::Parts},
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::Serialize;
use subtle::ConstantTimeEq;

use civic_domain::{
	principal::{Principal, Role},
	record::Collection,
};
use civic_service::{
	AddAnnouncementRequest, AddRecordResponse, AddReportRequest, Error as ServiceError,
	RelatedResponse, SearchRequest, SearchResponse, SubmitComplaintRequest,
	SubmitComplaintResponse, UpdateStatusRequest, UpdateStatusResponse,
};

use crate::state::AppState;

const USER_ID_HEADER: &str = "x-civic-user-id";
const ROLE_HEADER: &str = "x-civic-role";
const WARD_HEADER: &str = "x-civic-ward";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/complaints/search", post(search_complaints))
		.route("/v1/complaints/submit", post(submit_complaint))
		.route("/v1/complaints/{id}/related", get(related_complaints))
		.route("/v1/complaints/{id}/status", put(update_status))
		.route("/v1/announcements", post(add_announcement))
		.route("/v1/announcements/search", post(search_announcements))
		.route("/v1/reports", post(add_report))
		.route("/v1/reports/search", post(search_reports))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search_complaints(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(Collection::Complaints, &principal, payload).await?;

	Ok(Json(response))
}

async fn search_announcements(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(Collection::Announcements, &principal, payload).await?;

	Ok(Json(response))
}

async fn search_reports(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(Collection::Reports, &principal, payload).await?;

	Ok(Json(response))
}

async fn submit_complaint(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<SubmitComplaintRequest>,
) -> Result<Json<SubmitComplaintResponse>, ApiError> {
	let response = state.service.submit_with_related(&principal, payload).await?;

	Ok(Json(response))
}

async fn related_complaints(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(id): Path<i64>,
) -> Result<Json<RelatedResponse>, ApiError> {
	let response = state.service.related_to(&principal, id).await?;

	Ok(Json(response))
}

async fn update_status(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Path(id): Path<i64>,
	Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
	let response = state.service.update_status(&principal, id, payload).await?;

	Ok(Json(response))
}

async fn add_announcement(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<AddAnnouncementRequest>,
) -> Result<Json<AddRecordResponse>, ApiError> {
	let response = state.service.add_announcement(&principal, payload).await?;

	Ok(Json(response))
}

async fn add_report(
	State(state): State<AppState>,
	Caller(principal): Caller,
	Json(payload): Json<AddReportRequest>,
) -> Result<Json<AddRecordResponse>, ApiError> {
	let response = state.service.add_report(&principal, payload).await?;

	Ok(Json(response))
}

/// The principal forwarded by the gateway.
///
/// Identity is taken from headers as-is. When an API token is configured the request must also
/// carry it as a bearer token.
pub struct Caller(pub Principal);
impl FromRequestParts<AppState> for Caller {
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
		if let Some(expected) = state.api_auth_token() {
			let presented = parts
				.headers
				.get(header::AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.and_then(|value| value.strip_prefix("Bearer "));

			if !presented.is_some_and(|token| token_matches(token.trim(), expected)) {
				return Err(ApiError::unauthenticated("Missing or invalid bearer token."));
			}
		}

		principal_from_headers(&parts.headers).map(Caller)
	}
}

// Length mismatch is rejected up front; equal-length tokens compare in constant time.
fn token_matches(presented: &str, expected: &str) -> bool {
	presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
	let user_id = required_header(headers, USER_ID_HEADER)?
		.parse::<i64>()
		.map_err(|_| ApiError::unauthenticated(format!("{USER_ID_HEADER} must be an integer.")))?;
	let role = required_header(headers, ROLE_HEADER)?
		.parse::<Role>()
		.map_err(ApiError::unauthenticated)?;
	let ward = match header_str(headers, WARD_HEADER)? {
		Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
			ApiError::unauthenticated(format!("{WARD_HEADER} must be an integer."))
		})?),
		None => None,
	};

	Ok(Principal { user_id, role, ward })
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
	header_str(headers, name)?
		.ok_or_else(|| ApiError::unauthenticated(format!("{name} header is required.")))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
	let Some(value) = headers.get(name) else {
		return Ok(None);
	};
	let value = value
		.to_str()
		.map_err(|_| ApiError::unauthenticated(format!("{name} header must be ASCII.")))?
		.trim();

	Ok((!value.is_empty()).then_some(value))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}

	fn unauthenticated(message: impl Into<String>) -> Self {
		Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let status = match &err {
			ServiceError::InvalidQuery { .. } | ServiceError::InvalidParameter { .. } =>
				StatusCode::BAD_REQUEST,
			ServiceError::AccessDenied { .. } => StatusCode::FORBIDDEN,
			ServiceError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
			ServiceError::StoreUnavailable { .. } | ServiceError::ModelUnavailable { .. } =>
				StatusCode::SERVICE_UNAVAILABLE,
		};

		if status.is_server_error() {
			tracing::error!(error = %err, "Request failed.");
		}

		Self::new(status, err.code(), err.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
