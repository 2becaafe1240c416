//! Structured scalar filters.
//!
//! Filters are built here and lowered by the store to its own query language. Evaluation uses
//! SQL's three-valued logic so that an in-process evaluation keeps exactly the rows a
//! `WHERE` clause would keep: a comparison against a missing column is unknown, and only rows
//! evaluating to `true` survive.

use std::fmt::{Display, Formatter};

use crate::record::RecordMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
	Id,
	Ward,
	AuthorId,
	Status,
}
impl Field {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Id => "id",
			Self::Ward => "ward",
			Self::AuthorId => "author_id",
			Self::Status => "status",
		}
	}

	fn value_of(self, meta: &RecordMeta) -> Option<Scalar> {
		match self {
			Self::Id => Some(Scalar::Int(meta.id)),
			Self::Ward => meta.ward.map(|ward| Scalar::Int(i64::from(ward))),
			Self::AuthorId => meta.author_id.map(Scalar::Int),
			Self::Status => meta.status.clone().map(Scalar::Text),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
	Int(i64),
	Text(String),
}
impl From<i64> for Scalar {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<i32> for Scalar {
	fn from(value: i32) -> Self {
		Self::Int(i64::from(value))
	}
}
impl From<&str> for Scalar {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}
impl From<String> for Scalar {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl Display for Scalar {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Int(value) => write!(f, "{value}"),
			Self::Text(value) => write!(f, "{value:?}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
	True,
	Eq(Field, Scalar),
	In(Field, Vec<Scalar>),
	IsNull(Field),
	Not(Box<FilterExpr>),
	And(Vec<FilterExpr>),
	Or(Vec<FilterExpr>),
}
impl FilterExpr {
	pub fn eq(field: Field, value: impl Into<Scalar>) -> Self {
		Self::Eq(field, value.into())
	}

	pub fn ne(field: Field, value: impl Into<Scalar>) -> Self {
		Self::Not(Box::new(Self::eq(field, value)))
	}

	pub fn is_in<I, V>(field: Field, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Scalar>,
	{
		Self::In(field, values.into_iter().map(Into::into).collect())
	}

	pub fn is_null(field: Field) -> Self {
		Self::IsNull(field)
	}

	/// Conjunction that flattens nested `And`s and drops `True`.
	pub fn and(self, other: Self) -> Self {
		let mut terms = Vec::new();

		for expr in [self, other] {
			match expr {
				Self::True => {},
				Self::And(inner) => terms.extend(inner),
				other => terms.push(other),
			}
		}

		match terms.len() {
			0 => Self::True,
			1 => terms.pop().unwrap_or(Self::True),
			_ => Self::And(terms),
		}
	}

	pub fn or(self, other: Self) -> Self {
		if matches!(self, Self::True) || matches!(other, Self::True) {
			return Self::True;
		}

		let mut terms = Vec::new();

		for expr in [self, other] {
			match expr {
				Self::Or(inner) => terms.extend(inner),
				other => terms.push(other),
			}
		}

		Self::Or(terms)
	}

	/// Three-valued evaluation; `None` is SQL `NULL`.
	pub fn evaluate(&self, meta: &RecordMeta) -> Option<bool> {
		match self {
			Self::True => Some(true),
			Self::Eq(field, value) => field.value_of(meta).map(|actual| &actual == value),
			Self::In(field, values) =>
				field.value_of(meta).map(|actual| values.iter().any(|value| value == &actual)),
			Self::IsNull(field) => Some(field.value_of(meta).is_none()),
			Self::Not(inner) => inner.evaluate(meta).map(|value| !value),
			Self::And(terms) => {
				let mut unknown = false;

				for term in terms {
					match term.evaluate(meta) {
						Some(false) => return Some(false),
						None => unknown = true,
						Some(true) => {},
					}
				}

				if unknown { None } else { Some(true) }
			},
			Self::Or(terms) => {
				let mut unknown = false;

				for term in terms {
					match term.evaluate(meta) {
						Some(true) => return Some(true),
						None => unknown = true,
						Some(false) => {},
					}
				}

				if unknown { None } else { Some(false) }
			},
		}
	}

	pub fn matches(&self, meta: &RecordMeta) -> bool {
		self.evaluate(meta) == Some(true)
	}
}
impl Display for FilterExpr {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		fn join(f: &mut Formatter<'_>, terms: &[FilterExpr], op: &str) -> std::fmt::Result {
			f.write_str("(")?;

			for (idx, term) in terms.iter().enumerate() {
				if idx > 0 {
					write!(f, " {op} ")?;
				}

				write!(f, "{term}")?;
			}

			f.write_str(")")
		}

		match self {
			Self::True => f.write_str("TRUE"),
			Self::Eq(field, value) => write!(f, "{} = {value}", field.as_str()),
			Self::In(field, values) => {
				write!(f, "{} IN [", field.as_str())?;

				for (idx, value) in values.iter().enumerate() {
					if idx > 0 {
						f.write_str(", ")?;
					}

					write!(f, "{value}")?;
				}

				f.write_str("]")
			},
			Self::IsNull(field) => write!(f, "{} IS NULL", field.as_str()),
			Self::Not(inner) => write!(f, "NOT ({inner})"),
			Self::And(terms) => join(f, terms, "AND"),
			Self::Or(terms) => join(f, terms, "OR"),
		}
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn meta(ward: Option<i32>, author_id: Option<i64>, status: Option<&str>) -> RecordMeta {
		RecordMeta {
			id: 9,
			ward,
			author_id,
			status: status.map(str::to_string),
			created_at: datetime!(2025-01-01 00:00 UTC),
		}
	}

	#[test]
	fn and_flattens_and_drops_true() {
		let expr = FilterExpr::True
			.and(FilterExpr::eq(Field::Ward, 5))
			.and(FilterExpr::ne(Field::Id, 9_i64));

		assert_eq!(
			expr,
			FilterExpr::And(vec![FilterExpr::eq(Field::Ward, 5), FilterExpr::ne(Field::Id, 9_i64)])
		);
		assert_eq!(FilterExpr::True.and(FilterExpr::True), FilterExpr::True);
	}

	#[test]
	fn null_columns_are_unknown_not_false() {
		let city_wide = meta(None, None, None);
		let expr = FilterExpr::ne(Field::Ward, 5);

		assert_eq!(expr.evaluate(&city_wide), None);
		assert!(!expr.matches(&city_wide));
		assert!(FilterExpr::is_null(Field::Ward).matches(&city_wide));
	}

	#[test]
	fn or_recovers_from_unknown_branch() {
		let record = meta(None, Some(4), Some("pending"));
		let expr = FilterExpr::eq(Field::Ward, 3).or(FilterExpr::eq(Field::AuthorId, 4_i64));

		assert!(expr.matches(&record));
	}

	#[test]
	fn excluding_own_id_drops_only_that_row() {
		let expr = FilterExpr::eq(Field::Ward, 5).and(FilterExpr::ne(Field::Id, 9_i64));

		assert!(!expr.matches(&meta(Some(5), None, None)));
		assert!(
			expr.matches(&RecordMeta { id: 10, ..meta(Some(5), None, None) })
		);
	}

	#[test]
	fn renders_readably() {
		let expr = FilterExpr::eq(Field::Ward, 7)
			.and(FilterExpr::is_in(Field::Status, ["resolved", "in_progress"]));

		assert_eq!(expr.to_string(), "(ward = 7 AND status IN [\"resolved\", \"in_progress\"])");
	}
}
