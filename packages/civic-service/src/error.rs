use civic_domain::{vector::VectorError, visibility::AccessError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding model unavailable: {message}")]
	ModelUnavailable { message: String },
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Invalid parameter: {message}")]
	InvalidParameter { message: String },
	#[error("Record not found: {message}")]
	RecordNotFound { message: String },
	#[error("Store unavailable: {message}")]
	StoreUnavailable { message: String },
	#[error("Access denied: {message}")]
	AccessDenied { message: String },
}
impl Error {
	pub fn code(&self) -> &'static str {
		match self {
			Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
			Self::InvalidQuery { .. } => "INVALID_QUERY",
			Self::InvalidParameter { .. } => "INVALID_PARAMETER",
			Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
			Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
			Self::AccessDenied { .. } => "ACCESS_DENIED",
		}
	}

	pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
		Self::InvalidParameter { message: message.into() }
	}

	pub(crate) fn access_denied(message: impl Into<String>) -> Self {
		Self::AccessDenied { message: message.into() }
	}
}

impl From<civic_storage::Error> for Error {
	fn from(err: civic_storage::Error) -> Self {
		match err {
			civic_storage::Error::Sqlx(inner) =>
				Self::StoreUnavailable { message: inner.to_string() },
			civic_storage::Error::InvalidArgument(message) => Self::InvalidParameter { message },
			civic_storage::Error::NotFound(message) => Self::RecordNotFound { message },
			civic_storage::Error::Vector(message) => Self::StoreUnavailable { message },
		}
	}
}

impl From<civic_providers::Error> for Error {
	fn from(err: civic_providers::Error) -> Self {
		Self::ModelUnavailable { message: err.to_string() }
	}
}

impl From<VectorError> for Error {
	fn from(err: VectorError) -> Self {
		Self::ModelUnavailable { message: err.to_string() }
	}
}

impl From<AccessError> for Error {
	fn from(err: AccessError) -> Self {
		Self::AccessDenied { message: err.to_string() }
	}
}
