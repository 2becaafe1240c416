//! Lowers [`FilterExpr`] into a parameterized SQL boolean expression.
//!
//! Every value is bound, never interpolated. Fields a collection does not have lower to a typed
//! `NULL`, so they behave exactly like a missing column under three-valued logic.

use sqlx::{Postgres, QueryBuilder};

use civic_domain::{
	filter::{Field, FilterExpr, Scalar},
	record::Collection,
};

pub fn column(collection: Collection, field: Field) -> &'static str {
	match (collection, field) {
		(_, Field::Id) => "id",
		(_, Field::Ward) => "ward",
		(Collection::Complaints, Field::AuthorId) => "user_id",
		(Collection::Reports, Field::AuthorId) => "officer_id",
		(Collection::Announcements, Field::AuthorId) => "NULL::BIGINT",
		(Collection::Complaints, Field::Status) => "status",
		(Collection::Announcements | Collection::Reports, Field::Status) => "NULL::TEXT",
	}
}

pub fn push_filter(
	builder: &mut QueryBuilder<'_, Postgres>,
	collection: Collection,
	expr: &FilterExpr,
) {
	match expr {
		FilterExpr::True => {
			builder.push("TRUE");
		},
		FilterExpr::Eq(field, value) => {
			builder.push(column(collection, *field));
			builder.push(" = ");
			push_scalar(builder, value);
		},
		FilterExpr::In(_, values) if values.is_empty() => {
			builder.push("FALSE");
		},
		FilterExpr::In(field, values) => {
			builder.push(column(collection, *field));
			builder.push(" IN (");

			for (idx, value) in values.iter().enumerate() {
				if idx > 0 {
					builder.push(", ");
				}

				push_scalar(builder, value);
			}

			builder.push(")");
		},
		FilterExpr::IsNull(field) => {
			builder.push(column(collection, *field));
			builder.push(" IS NULL");
		},
		FilterExpr::Not(inner) => {
			builder.push("NOT (");
			push_filter(builder, collection, inner);
			builder.push(")");
		},
		FilterExpr::And(terms) => push_terms(builder, collection, terms, " AND ", "TRUE"),
		FilterExpr::Or(terms) => push_terms(builder, collection, terms, " OR ", "FALSE"),
	}
}

fn push_terms(
	builder: &mut QueryBuilder<'_, Postgres>,
	collection: Collection,
	terms: &[FilterExpr],
	separator: &str,
	identity: &str,
) {
	if terms.is_empty() {
		builder.push(identity);

		return;
	}

	builder.push("(");

	for (idx, term) in terms.iter().enumerate() {
		if idx > 0 {
			builder.push(separator);
		}

		push_filter(builder, collection, term);
	}

	builder.push(")");
}

fn push_scalar(builder: &mut QueryBuilder<'_, Postgres>, value: &Scalar) {
	match value {
		Scalar::Int(value) => {
			builder.push_bind(*value);
		},
		Scalar::Text(value) => {
			builder.push_bind(value.clone());
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lowered(collection: Collection, expr: &FilterExpr) -> String {
		let mut builder = QueryBuilder::<Postgres>::new("");

		push_filter(&mut builder, collection, expr);

		builder.sql().to_string()
	}

	#[test]
	fn lowers_citizen_scope_with_bound_values() {
		let expr = FilterExpr::eq(Field::AuthorId, 42_i64)
			.or(FilterExpr::is_in(Field::Status, ["resolved", "in_progress"]))
			.and(FilterExpr::ne(Field::Id, 9_i64));

		assert_eq!(
			lowered(Collection::Complaints, &expr),
			"((user_id = $1 OR status IN ($2, $3)) AND NOT (id = $4))"
		);
	}

	#[test]
	fn empty_in_list_matches_nothing() {
		let expr = FilterExpr::is_in(Field::Status, Vec::<String>::new());

		assert_eq!(lowered(Collection::Complaints, &expr), "FALSE");
	}

	#[test]
	fn missing_columns_lower_to_typed_null() {
		let expr = FilterExpr::eq(Field::Status, "resolved");

		assert_eq!(lowered(Collection::Reports, &expr), "NULL::TEXT = $1");
		assert_eq!(
			lowered(Collection::Announcements, &FilterExpr::is_null(Field::AuthorId)),
			"NULL::BIGINT IS NULL"
		);
	}

	#[test]
	fn true_lowers_to_literal() {
		assert_eq!(lowered(Collection::Announcements, &FilterExpr::True), "TRUE");
	}
}
