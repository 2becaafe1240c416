//! pgvector text format: `[0.1,0.2,...]`.

use crate::{Error, Result};

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets = trimmed
		.strip_prefix('[')
		.and_then(|s| s.strip_suffix(']'))
		.ok_or_else(|| Error::Vector("Vector text is not bracketed.".to_string()))?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	without_brackets
		.split(',')
		.map(|part| {
			part.trim()
				.parse::<f32>()
				.map_err(|_| Error::Vector("Vector text contains a non-numeric value.".to_string()))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_and_parses_pgvector_text() {
		let text = vector_to_pg(&[0.5, -0.25, 1.0]);

		assert_eq!(text, "[0.5,-0.25,1]");
		assert_eq!(parse_pg_vector(&text).expect("parse failed"), vec![0.5, -0.25, 1.0]);
		assert_eq!(parse_pg_vector("[]").expect("parse failed"), Vec::<f32>::new());
	}

	#[test]
	fn rejects_malformed_vector_text() {
		assert!(matches!(parse_pg_vector("0.5,0.1"), Err(Error::Vector(_))));
		assert!(matches!(parse_pg_vector("[0.5,abc]"), Err(Error::Vector(_))));
	}
}
