//! Cache persistence: a single file named `cache` in the working
//! directory, written at clean shutdown and read at startup (spec §6).
//!
//! The format is the length-prefixed record layout suggested in spec.md's
//! Design Notes — implementation-defined but stable across restarts of this
//! binary, which is all spec §6 requires. Every field is big-endian, in
//! keeping with the wire codec's byte order.
//!
//! Layout: a `u32` record count, then for each record: a `u64`
//! milliseconds-since-`UNIX_EPOCH` insertion timestamp, a length-prefixed
//! `rname`, a `u16 rtype`, a `u16 rclass`, a `u32 rttl`, and a
//! length-prefixed `rdata`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use codec::Rr;
use collections::bytes::{Reader, Writer};
use log::warn;
use utils::error::*;

use crate::{Cache, CacheEntry};

pub fn save(path: impl AsRef<Path>, cache: &Cache) -> Result {
	let entries = cache.snapshot();

	let now_instant = Instant::now();
	let now_unix = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();

	let mut w = Writer::new();
	w.u32(len_u32(entries.len())?);

	for entry in &entries {
		let elapsed = now_instant.duration_since(entry.inserted_at);
		let inserted_unix_ms = now_unix.saturating_sub(elapsed).as_millis() as u64;

		w.bytes(&inserted_unix_ms.to_be_bytes());
		write_record(&mut w, &entry.rr)?;
	}

	let mut file = File::create(path.as_ref()).map_err(|e| warn!("failed to create cache file: {e}"))?;
	file.write_all(&w.into_vec()).map_err(|e| warn!("failed to write cache file: {e}"))?;

	Ok(())
}

/// Loads a cache from `path`. Per spec §6/§7, a missing or corrupt file is
/// not fatal: the caller gets an empty cache and the reason is logged.
pub fn load(path: impl AsRef<Path>) -> Cache {
	match try_load(path) {
		Ok(cache) => cache,
		Err(()) => Cache::new(),
	}
}

fn try_load(path: impl AsRef<Path>) -> Result<Cache> {
	let mut file = File::open(path.as_ref()).map_err(|e| warn!("cache file not loaded: {e}"))?;

	let mut buf = Vec::new();
	file.read_to_end(&mut buf).map_err(|e| warn!("failed to read cache file: {e}"))?;

	let mut r = Reader::new(&buf);
	let count = r.u32()?;

	let now_instant = Instant::now();
	let now_unix = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();

	let mut entries = Vec::with_capacity(count as usize);

	for _ in 0..count {
		let inserted_unix_ms = u64::from_be_bytes(r.bytes(8)?.try_into().unwrap());
		let rr = read_record(&mut r)?;

		// Reconstruct a monotonic instant with the same offset from "now"
		// that the saved wall-clock timestamp had when it was written.
		let age_ms = now_unix.as_millis().saturating_sub(inserted_unix_ms as u128) as u64;
		let inserted_at = now_instant.checked_sub(std::time::Duration::from_millis(age_ms)).unwrap_or(now_instant);

		entries.push(CacheEntry { inserted_at, rr });
	}

	Ok(Cache::from_entries(entries))
}

fn write_record(w: &mut Writer, rr: &Rr) -> Result {
	write_bytes(w, rr.rname.as_bytes())?;
	w.u16(rr.rtype);
	w.u16(rr.rclass);
	w.u32(rr.rttl);
	write_bytes(w, &rr.rdata)?;
	Ok(())
}

fn read_record(r: &mut Reader) -> Result<Rr> {
	let rname = read_string(r)?;
	let rtype = r.u16()?;
	let rclass = r.u16()?;
	let rttl = r.u32()?;
	let rdata = read_bytes(r)?;
	Ok(Rr::new(rname, rtype, rclass, rttl, rdata))
}

fn write_bytes(w: &mut Writer, b: &[u8]) -> Result {
	w.u32(len_u32(b.len())?);
	w.bytes(b);
	Ok(())
}

fn read_bytes(r: &mut Reader) -> Result<Vec<u8>> {
	let len = r.u32()? as usize;
	Ok(r.bytes(len)?.to_vec())
}

fn read_string(r: &mut Reader) -> Result<String> {
	let bytes = read_bytes(r)?;
	String::from_utf8(bytes).map_err(|_| warn!("cache file contains a non-UTF-8 name"))
}

fn len_u32(n: usize) -> Result<u32> {
	u32::try_from(n).map_err(|_| warn!("{n} bytes doesn't fit a 32-bit length prefix"))
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn save_then_load_round_trips_live_entries() {
		let dir = std::env::temp_dir().join(format!("dnsfwd-cache-test-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("cache");

		let cache = Cache::new();
		cache.insert(Rr::new("a.test.", 1, 1, 3600, [1, 2, 3, 4]));

		save(&path, &cache).unwrap();
		let loaded = load(&path);

		let found = loaded.lookup(&codec::Question::new("a.test.", 1, 1));
		assert_eq!(found, vec![Rr::new("a.test.", 1, 1, 3600, [1, 2, 3, 4])]);

		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn loading_a_missing_file_yields_an_empty_cache() {
		let cache = load("/nonexistent/path/to/a/cache/file");
		assert_eq!(cache.status(), "");
	}

	#[test]
	fn an_entry_whose_ttl_elapsed_during_downtime_does_not_survive_load() {
		let dir = std::env::temp_dir().join(format!("dnsfwd-cache-test-expiry-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("cache");

		let cache = Cache::new();
		cache.insert(Rr::new("a.test.", 1, 1, 1, [1, 2, 3, 4]));

		std::thread::sleep(Duration::from_millis(1100));
		save(&path, &cache).unwrap();

		let loaded = load(&path);
		assert!(loaded.lookup(&codec::Question::new("a.test.", 1, 1)).is_empty());

		std::fs::remove_file(&path).ok();
	}
}
