use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Instant;

use codec::{Question, Rr};

use crate::CacheEntry;

/// The process-wide mutable cache, shared by every request handler.
///
/// Every public method performs the lazy expiry sweep described in spec
/// §4.3 before doing its own work, so an expired entry is never observable
/// from outside regardless of which method is called.
#[derive(Default)]
pub struct Cache {
	entries: Mutex<Vec<CacheEntry>>,
}

impl Cache {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn from_entries(entries: Vec<CacheEntry>) -> Self {
		Self { entries: Mutex::new(entries) }
	}

	/// Removes every entry whose remaining TTL has gone negative.
	pub fn sweep(&self) {
		let now = Instant::now();
		self.entries.lock().unwrap().retain(|e| e.is_live(now));
	}

	/// Returns every live entry whose `(rname, rtype, rclass)` matches `q`,
	/// in insertion order.
	pub fn lookup(&self, q: &Question) -> Vec<Rr> {
		self.sweep();
		self.entries.lock().unwrap().iter().filter(|e| q.matches(&e.rr)).map(|e| e.rr.clone()).collect()
	}

	/// Inserts `rr`, unless an entry with the same `(rname, rtype, rclass,
	/// rdata)` key already exists, in which case this is a no-op.
	pub fn insert(&self, rr: Rr) {
		self.sweep();

		let mut entries = self.entries.lock().unwrap();

		if entries.iter().any(|e| e.rr.same_key(&rr)) {
			return;
		}

		entries.push(CacheEntry::new(rr));
	}

	/// One line per live entry: remaining seconds and a human-readable RR
	/// summary, for the console's `cache` command.
	pub fn status(&self) -> String {
		self.sweep();

		let now = Instant::now();
		let entries = self.entries.lock().unwrap();

		let mut out = String::new();

		for entry in entries.iter() {
			let rr = &entry.rr;
			let _ = writeln!(out, "{:5}s  {:32} {:5} {:5} {:?}", entry.remaining(now), rr.rname, rr.rtype, rr.rclass, rr.rdata);
		}

		out
	}

	/// A snapshot of the live entries, used by [`crate::persist::save`].
	pub(crate) fn snapshot(&self) -> Vec<CacheEntry> {
		self.sweep();
		self.entries.lock().unwrap().clone()
	}
}

#[cfg(test)]
mod tests {
	use std::thread::sleep;
	use std::time::Duration;

	use codec::Question;

	use super::*;

	fn rr(name: &str, ttl: u32) -> Rr {
		Rr::new(name, 1, 1, ttl, [1, 2, 3, 4])
	}

	#[test]
	fn insert_then_lookup_finds_the_record() {
		let cache = Cache::new();
		cache.insert(rr("www.example.com.", 60));

		let found = cache.lookup(&Question::new("www.example.com.", 1, 1));
		assert_eq!(found, vec![rr("www.example.com.", 60)]);
	}

	#[test]
	fn duplicate_insert_is_a_no_op() {
		let cache = Cache::new();
		cache.insert(rr("a.test.", 60));
		cache.insert(rr("a.test.", 60));

		assert_eq!(cache.entries.lock().unwrap().len(), 1);
	}

	#[test]
	fn expired_entries_are_absent_from_lookups_and_status() {
		let cache = Cache::new();
		cache.insert(rr("x.test.", 1));

		sleep(Duration::from_millis(1100));

		assert!(cache.lookup(&Question::new("x.test.", 1, 1)).is_empty());
		assert!(cache.status().is_empty());
	}

	#[test]
	fn lookup_only_returns_matching_type_and_class() {
		let cache = Cache::new();
		cache.insert(rr("a.test.", 60));
		cache.insert(Rr::new("a.test.", 5, 1, 60, b"cname".to_vec()));

		let found = cache.lookup(&Question::new("a.test.", 1, 1));
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].rtype, 1);
	}
}
