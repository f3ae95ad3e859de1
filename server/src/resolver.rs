//! The resolver (spec §4.4): consult the cache, chasing CNAME chains, and
//! fall back to the upstream forwarder on a miss.

use std::net::{IpAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cache::Cache;
use codec::{flags, Message, Question, Rr};
use log::warn;

const TY_CNAME: u16 = 5;

/// Bounds CNAME recursion against cycles planted in cached data (spec
/// §4.4).
const MAX_CNAME_DEPTH: u8 = 8;

/// One attempt, one timeout, no retries (spec §7) — the client is
/// responsible for its own retry.
const FORWARDER_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Resolver {
	cache: Arc<Cache>,
	forwarder: IpAddr,
	forwarder_enabled: Arc<AtomicBool>,
}

impl Resolver {
	pub fn new(cache: Arc<Cache>, forwarder: IpAddr, forwarder_enabled: Arc<AtomicBool>) -> Self {
		Self { cache, forwarder, forwarder_enabled }
	}

	/// Resolves a single question, consulting the cache first and falling
	/// back to the forwarder on a miss (spec §4.4).
	pub fn resolve(&self, q: &Question) -> Vec<Rr> {
		let answers = self.resolve_from_cache(q, 0);

		if !answers.is_empty() || !self.forwarder_enabled.load(Ordering::Relaxed) {
			return answers;
		}

		if self.query_forwarder(q) {
			self.resolve_from_cache(q, 0)
		} else {
			answers
		}
	}

	/// The cache path with CNAME chasing (spec §4.4 step 1).
	fn resolve_from_cache(&self, q: &Question, depth: u8) -> Vec<Rr> {
		if depth < MAX_CNAME_DEPTH {
			let cname_question = Question::new(q.qname.clone(), TY_CNAME, q.qclass);

			for cname in self.cache.lookup(&cname_question) {
				let Ok(canonical) = cname.rdata_name() else { continue };

				let target = Question::new(canonical, q.qtype, q.qclass);
				let mut chased = self.resolve_from_cache(&target, depth + 1);

				if !chased.is_empty() {
					chased.push(cname);
					return chased;
				}
			}
		}

		self.cache.lookup(q)
	}

	/// The forwarder path (spec §4.4 step 2): a fresh query over a fresh
	/// socket, a single reply, everything from it cached. Returns whether a
	/// reply was received and its records were cached.
	fn query_forwarder(&self, q: &Question) -> bool {
		let query = Message {
			id: rand::random(),
			flags: flags::STANDARD_QUERY,
			questions: vec![q.clone()],
			answers: vec![],
			authority: vec![],
			additional: vec![],
		};

		let Ok(bytes) = query.serialize() else {
			warn!("failed to build forwarder query for {}", q.qname);
			return false;
		};

		let socket = match UdpSocket::bind("0.0.0.0:0") {
			Ok(socket) => socket,
			Err(err) => {
				warn!("failed to open forwarder socket: {err}");
				return false;
			}
		};

		if socket.set_read_timeout(Some(FORWARDER_TIMEOUT)).is_err() {
			warn!("failed to set forwarder socket timeout");
			return false;
		}

		if let Err(err) = socket.send_to(&bytes, (self.forwarder, 53)) {
			warn!("failed to reach forwarder {}: {err}", self.forwarder);
			return false;
		}

		let mut buf = [0u8; 512];

		let (n, _) = match socket.recv_from(&mut buf) {
			Ok(v) => v,
			Err(err) => {
				warn!("forwarder {} did not answer for {}: {err}", self.forwarder, q.qname);
				return false;
			}
		};

		apply_forwarder_reply(&self.cache, &buf[..n], self.forwarder)
	}
}

/// Parses a forwarder reply and caches every record it carries (spec §4.4
/// step 2). Split out from [`Resolver::query_forwarder`] so the caching
/// behaviour can be exercised without a real socket round trip.
fn apply_forwarder_reply(cache: &Cache, bytes: &[u8], forwarder: IpAddr) -> bool {
	let reply = match Message::parse(bytes) {
		Ok(reply) => reply,
		Err(()) => {
			warn!("forwarder {forwarder} returned a malformed reply");
			return false;
		}
	};

	for rr in reply.answers.into_iter().chain(reply.authority).chain(reply.additional) {
		cache.insert(rr);
	}

	true
}

#[cfg(test)]
mod tests {
	use std::net::Ipv4Addr;
	use std::sync::atomic::AtomicBool;

	use cache::Cache;
	use codec::Rr;

	use super::*;

	fn resolver_with(cache: Cache, enabled: bool) -> Resolver {
		Resolver::new(Arc::new(cache), IpAddr::V4(Ipv4Addr::LOCALHOST), Arc::new(AtomicBool::new(enabled)))
	}

	#[test]
	fn cache_hit_returns_the_cached_record() {
		let cache = Cache::new();
		cache.insert(Rr::new("www.example.com.", 1, 1, 60, [1, 2, 3, 4]));

		let resolver = resolver_with(cache, false);
		let answers = resolver.resolve(&Question::new("www.example.com.", 1, 1));

		assert_eq!(answers, vec![Rr::new("www.example.com.", 1, 1, 60, [1, 2, 3, 4])]);
	}

	#[test]
	fn cname_chase_appends_the_cname_after_the_target_record() {
		let cache = Cache::new();

		let mut w = collections::bytes::Writer::new();
		codec::name::encode(&mut w, "b.test.").unwrap();
		cache.insert(Rr::new("a.test.", 5, 1, 60, w.into_vec()));
		cache.insert(Rr::new("b.test.", 1, 1, 60, [10, 0, 0, 1]));

		let resolver = resolver_with(cache, false);
		let answers = resolver.resolve(&Question::new("a.test.", 1, 1));

		assert_eq!(answers.len(), 2);
		assert_eq!(answers[0].rname, "b.test.");
		assert_eq!(answers[1].rname, "a.test.");
	}

	#[test]
	fn forwarder_disabled_and_empty_cache_yields_no_answers() {
		let resolver = resolver_with(Cache::new(), false);
		let answers = resolver.resolve(&Question::new("x.test.", 1, 1));
		assert!(answers.is_empty());
	}

	#[test]
	fn forwarder_reply_is_cached_and_served_on_the_next_lookup() {
		let question = Question::new("fresh.test.", 1, 1);

		let reply = Message {
			id: 42,
			flags: flags::RESPONSE,
			questions: vec![question.clone()],
			answers: vec![Rr::new("fresh.test.", 1, 1, 60, [93, 184, 216, 34])],
			authority: vec![],
			additional: vec![],
		};

		let cache = Cache::new();
		assert!(apply_forwarder_reply(&cache, &reply.serialize().unwrap(), IpAddr::V4(Ipv4Addr::LOCALHOST)));

		let resolver = resolver_with(cache, false);
		let answers = resolver.resolve(&question);

		assert_eq!(answers, vec![Rr::new("fresh.test.", 1, 1, 60, [93, 184, 216, 34])]);
	}

	#[test]
	fn malformed_forwarder_reply_is_rejected_without_caching_anything() {
		let cache = Cache::new();
		assert!(!apply_forwarder_reply(&cache, &[0xff, 0x00], IpAddr::V4(Ipv4Addr::LOCALHOST)));
		assert!(cache.lookup(&Question::new("fresh.test.", 1, 1)).is_empty());
	}
}
