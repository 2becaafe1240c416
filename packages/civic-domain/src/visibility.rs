//! Role-based visibility, computed once per request.
//!
//! This is the only place that branches on [`Role`]. Every query path asks the predicate for a
//! [`FilterExpr`] and conjoins it with whatever else it filters on, so a caller-supplied filter
//! can narrow what is visible but never widen it.

use crate::{
	filter::{Field, FilterExpr},
	principal::{Principal, Role},
	record::Collection,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
	#[error("A {} principal must carry a ward.", role.as_str())]
	MissingWard { role: Role },
	#[error("A {} principal has no visible scope over {collection}.", role.as_str())]
	NoScope { role: Role, collection: Collection },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityPredicate {
	Unrestricted,
	Ward { ward: i32 },
	Citizen { user_id: i64, public_statuses: Vec<String> },
}
impl VisibilityPredicate {
	pub fn for_principal(
		principal: &Principal,
		public_statuses: &[String],
	) -> Result<Self, AccessError> {
		match principal.role {
			Role::Admin => Ok(Self::Unrestricted),
			Role::Officer => {
				let ward = principal.ward.ok_or(AccessError::MissingWard { role: Role::Officer })?;

				Ok(Self::Ward { ward })
			},
			Role::Citizen => {
				principal.ward.ok_or(AccessError::MissingWard { role: Role::Citizen })?;

				Ok(Self::Citizen {
					user_id: principal.user_id,
					public_statuses: public_statuses.to_vec(),
				})
			},
		}
	}

	pub fn role(&self) -> Role {
		match self {
			Self::Unrestricted => Role::Admin,
			Self::Ward { .. } => Role::Officer,
			Self::Citizen { .. } => Role::Citizen,
		}
	}

	/// Everything the caller may see in `collection`.
	pub fn scope(&self, collection: Collection) -> Result<FilterExpr, AccessError> {
		match (collection, self) {
			(_, Self::Unrestricted) => Ok(FilterExpr::True),
			(Collection::Complaints, Self::Ward { ward }) => Ok(FilterExpr::eq(Field::Ward, *ward)),
			(Collection::Complaints, Self::Citizen { user_id, public_statuses }) =>
				Ok(FilterExpr::eq(Field::AuthorId, *user_id)
					.or(FilterExpr::is_in(Field::Status, public_statuses.iter().cloned()))),
			(Collection::Announcements, Self::Ward { ward }) =>
				Ok(FilterExpr::eq(Field::Ward, *ward).or(FilterExpr::is_null(Field::Ward))),
			(Collection::Announcements, Self::Citizen { .. }) => Ok(FilterExpr::True),
			(Collection::Reports, Self::Ward { ward }) => Ok(FilterExpr::eq(Field::Ward, *ward)),
			(Collection::Reports, Self::Citizen { .. }) =>
				Err(AccessError::NoScope { role: Role::Citizen, collection }),
		}
	}

	/// The visible scope intersected with an optional caller-requested ward.
	pub fn restrict(
		&self,
		collection: Collection,
		ward_filter: Option<i32>,
	) -> Result<FilterExpr, AccessError> {
		let scope = self.scope(collection)?;
		let Some(ward) = ward_filter else {
			return Ok(scope);
		};

		Ok(scope.and(ward_filter_expr(collection, ward)))
	}
}

/// Ward scoping for `collection`. City-wide announcements belong to every ward.
pub fn ward_filter_expr(collection: Collection, ward: i32) -> FilterExpr {
	match collection {
		Collection::Announcements =>
			FilterExpr::eq(Field::Ward, ward).or(FilterExpr::is_null(Field::Ward)),
		Collection::Complaints | Collection::Reports => FilterExpr::eq(Field::Ward, ward),
	}
}
