use std::sync::{
	Mutex,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use civic_providers::{BoxFuture, EmbeddingProvider, Error};

/// Deterministic bag-of-words encoder: each lowercase word adds weight to one hashed bucket.
///
/// Texts sharing words point in similar directions, which is enough to exercise ranking without
/// a real model. Output is deliberately not unit length.
pub struct StubEmbedding {
	dim: usize,
	calls: AtomicUsize,
	seen: Mutex<Vec<String>>,
	failing: AtomicBool,
	rejected: Mutex<Vec<String>>,
}
impl StubEmbedding {
	pub fn new(dim: usize) -> Self {
		Self {
			dim,
			calls: AtomicUsize::new(0),
			seen: Mutex::new(Vec::new()),
			failing: AtomicBool::new(false),
			rejected: Mutex::new(Vec::new()),
		}
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	/// Number of `embed` calls that reached the encoder.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Every text passed to the encoder, in call order.
	pub fn seen(&self) -> Vec<String> {
		self.seen.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	/// Fails any call whose input contains `needle`, the way an endpoint refuses one bad input
	/// and with it the whole request.
	pub fn reject_containing(&self, needle: &str) {
		self.rejected.lock().unwrap_or_else(|err| err.into_inner()).push(needle.to_string());
	}

	pub fn encode(&self, text: &str) -> Vec<f32> {
		let mut vec = vec![0.0_f32; self.dim];
		let lowered = text.to_lowercase();
		let mut any = false;

		for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|word| !word.is_empty()) {
			vec[bucket(word, self.dim)] += 3.0;
			any = true;
		}

		if !any {
			vec[bucket(lowered.trim(), self.dim)] += 3.0;
		}

		vec
	}
}

impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, civic_providers::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.seen.lock().unwrap_or_else(|err| err.into_inner()).extend(texts.iter().cloned());

		let rejected = {
			let needles = self.rejected.lock().unwrap_or_else(|err| err.into_inner());

			texts.iter().any(|text| needles.iter().any(|needle| text.contains(needle.as_str())))
		};
		let result = if self.failing.load(Ordering::SeqCst) {
			Err(Error::Inference { message: "Stub encoder is failing.".to_string() })
		} else if rejected {
			Err(Error::InvalidResponse { message: "Stub encoder rejected an input.".to_string() })
		} else {
			Ok(texts.iter().map(|text| self.encode(text)).collect())
		};

		Box::pin(async move { result })
	}
}

fn bucket(word: &str, dim: usize) -> usize {
	// FNV-1a.
	let mut hash: u64 = 0xcbf2_9ce4_8422_2325;

	for byte in word.bytes() {
		hash ^= u64::from(byte);
		hash = hash.wrapping_mul(0x0100_0000_01b3);
	}

	(hash % dim as u64) as usize
}
