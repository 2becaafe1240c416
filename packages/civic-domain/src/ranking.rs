//! The ranking policy shared by every similarity consumer.
//!
//! Candidates are ordered by score descending, then creation time descending, then id
//! ascending, which is a total order for any candidate set with distinct ids.

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::record::{Collection, RecordRef};

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub id: i64,
	pub score: f32,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
	pub record: RecordRef,
	pub score: f32,
	pub rank: u32,
}

pub fn cmp_candidates(a: &Candidate, b: &Candidate) -> Ordering {
	b.score
		.total_cmp(&a.score)
		.then_with(|| b.created_at.cmp(&a.created_at))
		.then_with(|| a.id.cmp(&b.id))
}

/// Orders, thresholds, truncates, and numbers `candidates`.
///
/// Non-finite scores are dropped (they can only come from a degenerate vector). Duplicate ids
/// keep their best-scoring entry.
pub fn rank(
	collection: Collection,
	candidates: Vec<Candidate>,
	min_score: Option<f32>,
	limit: usize,
) -> Vec<RankedResult> {
	let mut best: HashMap<i64, Candidate> = HashMap::with_capacity(candidates.len());

	for candidate in candidates {
		if !candidate.score.is_finite() {
			continue;
		}
		if min_score.is_some_and(|min| candidate.score < min) {
			continue;
		}

		match best.get(&candidate.id) {
			Some(existing) if cmp_candidates(existing, &candidate) != Ordering::Greater => {},
			_ => {
				best.insert(candidate.id, candidate);
			},
		}
	}

	let mut ordered: Vec<Candidate> = best.into_values().collect();

	ordered.sort_by(cmp_candidates);
	ordered.truncate(limit);

	ordered
		.into_iter()
		.enumerate()
		.map(|(idx, candidate)| RankedResult {
			record: RecordRef { collection, id: candidate.id },
			score: candidate.score.clamp(-1.0, 1.0),
			rank: idx as u32 + 1,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn candidate(id: i64, score: f32, created_at: OffsetDateTime) -> Candidate {
		Candidate { id, score, created_at }
	}

	#[test]
	fn keeps_best_duplicate() {
		let at = datetime!(2025-03-01 10:00 UTC);
		let ranked = rank(
			Collection::Complaints,
			vec![candidate(1, 0.2, at), candidate(1, 0.7, at), candidate(2, 0.5, at)],
			None,
			10,
		);

		assert_eq!(ranked.len(), 2);
		assert_eq!(ranked[0].record.id, 1);
		assert_eq!(ranked[0].score, 0.7);
	}

	#[test]
	fn drops_nan_scores() {
		let at = datetime!(2025-03-01 10:00 UTC);
		let ranked = rank(
			Collection::Complaints,
			vec![candidate(1, f32::NAN, at), candidate(2, 0.1, at)],
			None,
			10,
		);

		assert_eq!(ranked.len(), 1);
		assert_eq!(ranked[0].record.id, 2);
	}
}
