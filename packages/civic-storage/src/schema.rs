pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_complaints.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_complaints.sql")),
				"tables/002_announcements.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_announcements.sql")),
				"tables/003_reports.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_reports.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_every_table_with_dimension() {
		let sql = render_schema(384);

		assert!(!sql.contains("\\ir "));
		assert!(!sql.contains("<VECTOR_DIM>"));

		for table in ["complaints", "announcements", "reports"] {
			assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
		}

		assert_eq!(sql.matches("VECTOR(384)").count(), 3);
		assert_eq!(sql.matches("vector_cosine_ops").count(), 3);
	}
}
