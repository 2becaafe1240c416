//! Fixed-dimension embedding vectors.
//!
//! A vector is either unit length or the all-zero sentinel that stands for "no semantic
//! content". The sentinel never takes part in similarity; [`EmbeddingVector::similarity`]
//! returns `None` for it instead of a score.

use std::fmt::{Display, Formatter};

/// Norms below this are treated as degenerate model output rather than rescaled.
const MIN_NORM: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorError {
	#[error("Embedding has {actual} dimensions, expected {expected}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Embedding contains a non-finite component.")]
	NonFinite,
	#[error("Embedding norm is too small to normalize.")]
	Degenerate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Vec<f32>);
impl EmbeddingVector {
	pub fn sentinel(dim: usize) -> Self {
		Self(vec![0.0; dim])
	}

	/// L2-normalizes raw model output.
	pub fn normalized(raw: Vec<f32>, dim: usize) -> Result<Self, VectorError> {
		if raw.len() != dim {
			return Err(VectorError::DimensionMismatch { expected: dim, actual: raw.len() });
		}
		if raw.iter().any(|value| !value.is_finite()) {
			return Err(VectorError::NonFinite);
		}

		let norm = l2_norm(&raw);

		if norm < MIN_NORM {
			return Err(VectorError::Degenerate);
		}
		// Already unit length; rescaling would only add rounding noise.
		if (norm - 1.0).abs() <= 1e-7 {
			return Ok(Self(raw));
		}

		Ok(Self(raw.into_iter().map(|value| (f64::from(value) / norm) as f32).collect()))
	}

	/// Wraps a vector read back from storage without renormalizing it.
	pub fn from_stored(values: Vec<f32>, dim: usize) -> Result<Self, VectorError> {
		if values.len() != dim {
			return Err(VectorError::DimensionMismatch { expected: dim, actual: values.len() });
		}
		if values.iter().any(|value| !value.is_finite()) {
			return Err(VectorError::NonFinite);
		}

		Ok(Self(values))
	}

	pub fn dim(&self) -> usize {
		self.0.len()
	}

	pub fn as_slice(&self) -> &[f32] {
		&self.0
	}

	pub fn into_inner(self) -> Vec<f32> {
		self.0
	}

	pub fn is_sentinel(&self) -> bool {
		self.0.iter().all(|value| *value == 0.0)
	}

	pub fn norm(&self) -> f64 {
		l2_norm(&self.0)
	}

	/// Cosine similarity of two unit vectors, clamped to [-1, 1].
	pub fn similarity(&self, other: &Self) -> Option<f32> {
		if self.dim() != other.dim() || self.is_sentinel() || other.is_sentinel() {
			return None;
		}

		let dot: f64 =
			self.0.iter().zip(&other.0).map(|(a, b)| f64::from(*a) * f64::from(*b)).sum();

		Some(dot.clamp(-1.0, 1.0) as f32)
	}
}
impl Display for EmbeddingVector {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "EmbeddingVector(dim={}, sentinel={})", self.dim(), self.is_sentinel())
	}
}

fn l2_norm(values: &[f32]) -> f64 {
	values.iter().map(|value| f64::from(*value) * f64::from(*value)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_to_unit_length() {
		let vec = EmbeddingVector::normalized(vec![3.0, 4.0, 0.0], 3).expect("normalize failed");

		assert!((vec.norm() - 1.0).abs() < 1e-6);
		assert!((vec.as_slice()[0] - 0.6).abs() < 1e-6);
	}

	#[test]
	fn keeps_unit_vectors_untouched() {
		let raw = vec![0.0, 1.0, 0.0];
		let vec = EmbeddingVector::normalized(raw.clone(), 3).expect("normalize failed");

		assert_eq!(vec.as_slice(), raw.as_slice());
	}

	#[test]
	fn rejects_degenerate_and_mismatched_input() {
		assert_eq!(EmbeddingVector::normalized(vec![0.0; 4], 4), Err(VectorError::Degenerate));
		assert_eq!(
			EmbeddingVector::normalized(vec![1.0; 3], 4),
			Err(VectorError::DimensionMismatch { expected: 4, actual: 3 })
		);
		assert_eq!(
			EmbeddingVector::normalized(vec![f32::NAN, 1.0], 2),
			Err(VectorError::NonFinite)
		);
	}

	#[test]
	fn sentinel_has_no_similarity() {
		let sentinel = EmbeddingVector::sentinel(2);
		let unit = EmbeddingVector::normalized(vec![1.0, 0.0], 2).expect("normalize failed");

		assert!(sentinel.is_sentinel());
		assert_eq!(sentinel.similarity(&unit), None);
		assert_eq!(unit.similarity(&sentinel), None);
		assert_eq!(unit.similarity(&unit), Some(1.0));
	}
}
