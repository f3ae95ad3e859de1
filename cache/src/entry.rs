use std::time::Instant;

use codec::Rr;

#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub inserted_at: Instant,
	pub rr: Rr,
}

impl CacheEntry {
	pub fn new(rr: Rr) -> Self {
		Self { inserted_at: Instant::now(), rr }
	}

	/// Remaining TTL in seconds, signed so callers can tell "just expired"
	/// from "nowhere close" when logging.
	pub fn remaining(&self, now: Instant) -> i64 {
		self.rr.rttl as i64 - now.duration_since(self.inserted_at).as_secs() as i64
	}

	pub fn is_live(&self, now: Instant) -> bool {
		self.remaining(now) >= 0
	}
}
