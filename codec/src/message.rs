//! Full DNS message parsing and serialization: the 12-byte header, the
//! question section, and the three resource-record sections, all built on
//! top of [`crate::name`].

use collections::bytes::{Reader, Writer};
use log::warn;
use utils::error::*;

use crate::name;

/// `rtype` values whose `rdata` is itself a domain name and must be
/// canonicalized (decompressed) on parse.
const TY_NS: u16 = 2;
const TY_CNAME: u16 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
	pub qname: String,
	pub qtype: u16,
	pub qclass: u16,
}

impl Question {
	pub fn new(qname: impl Into<String>, qtype: u16, qclass: u16) -> Self {
		Self { qname: qname.into(), qtype, qclass }
	}

	/// Whether `rr` is a valid answer to this question, per spec §4.3: a
	/// cache lookup key match on `(rname, rtype, rclass)`.
	pub fn matches(&self, rr: &Rr) -> bool {
		self.qname == rr.rname && self.qtype == rr.rtype && self.qclass == rr.rclass
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rr {
	pub rname: String,
	pub rtype: u16,
	pub rclass: u16,
	pub rttl: u32,
	pub rdata: Vec<u8>,
}

impl Rr {
	pub fn new(rname: impl Into<String>, rtype: u16, rclass: u16, rttl: u32, rdata: impl Into<Vec<u8>>) -> Self {
		Self { rname: rname.into(), rtype, rclass, rttl, rdata: rdata.into() }
	}

	/// The cache's dedup key (spec §3): `rttl` is deliberately excluded, so
	/// that two records differing only in remaining TTL are the same entry.
	pub fn same_key(&self, other: &Rr) -> bool {
		self.rname == other.rname && self.rtype == other.rtype && self.rclass == other.rclass && self.rdata == other.rdata
	}

	/// Decodes the canonical name carried in a CNAME/NS record's `rdata`.
	/// Returns `Err` if this record's type doesn't carry a name, or if the
	/// stored `rdata` isn't a validly encoded one (it always should be,
	/// since [`decode_rr`] canonicalizes it on the way in).
	pub fn rdata_name(&self) -> Result<String> {
		if self.rtype != TY_NS && self.rtype != TY_CNAME {
			warn!("rdata_name called on an RR of type {}, which carries no name", self.rtype);
			return Err(());
		}

		let mut r = Reader::new(&self.rdata);
		name::decode(&mut r)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
	pub id: u16,
	pub flags: u16,
	pub questions: Vec<Question>,
	pub answers: Vec<Rr>,
	pub authority: Vec<Rr>,
	pub additional: Vec<Rr>,
}

impl Message {
	pub fn parse(buf: &[u8]) -> Result<Message> {
		let mut r = Reader::new(buf);

		let id = r.u16()?;
		let flags = r.u16()?;
		let qdcount = r.u16()?;
		let ancount = r.u16()?;
		let nscount = r.u16()?;
		let arcount = r.u16()?;

		let questions = (0..qdcount).map(|_| decode_question(&mut r)).collect::<Result<Vec<_>>>()?;
		let answers = (0..ancount).map(|_| decode_rr(&mut r)).collect::<Result<Vec<_>>>()?;
		let authority = (0..nscount).map(|_| decode_rr(&mut r)).collect::<Result<Vec<_>>>()?;
		let additional = (0..arcount).map(|_| decode_rr(&mut r)).collect::<Result<Vec<_>>>()?;

		Ok(Message { id, flags, questions, answers, authority, additional })
	}

	/// Serializes the message, taking section counts from the actual
	/// vector lengths rather than any value that was parsed in (spec §4.2).
	pub fn serialize(&self) -> Result<Vec<u8>> {
		let mut w = Writer::new();

		w.u16(self.id);
		w.u16(self.flags);
		w.u16(len_u16(self.questions.len())?);
		w.u16(len_u16(self.answers.len())?);
		w.u16(len_u16(self.authority.len())?);
		w.u16(len_u16(self.additional.len())?);

		for q in &self.questions {
			encode_question(&mut w, q)?;
		}

		for rr in self.answers.iter().chain(&self.authority).chain(&self.additional) {
			encode_rr(&mut w, rr)?;
		}

		Ok(w.into_vec())
	}
}

fn len_u16(n: usize) -> Result<u16> {
	u16::try_from(n).map_err(|_| warn!("section has {n} records, which doesn't fit a 16-bit count"))
}

fn decode_question(r: &mut Reader) -> Result<Question> {
	let qname = name::decode(r)?;
	let qtype = r.u16()?;
	let qclass = r.u16()?;
	Ok(Question { qname, qtype, qclass })
}

fn encode_question(w: &mut Writer, q: &Question) -> Result {
	name::encode(w, &q.qname)?;
	w.u16(q.qtype);
	w.u16(q.qclass);
	Ok(())
}

fn decode_rr(r: &mut Reader) -> Result<Rr> {
	let rname = name::decode(r)?;
	let rtype = r.u16()?;
	let rclass = r.u16()?;
	let rttl = r.u32()?;
	let rdlen = r.u16()? as usize;

	let rdata = if rtype == TY_NS || rtype == TY_CNAME {
		// The name may be compressed relative to the whole packet; decode
		// it from a forked cursor so `r` still advances by exactly
		// `rdlen`, matching spec §4.2 for both branches.
		let mut sub = r.at(r.pos())?;
		let decoded = name::decode(&mut sub)?;
		r.bytes(rdlen)?;

		let mut w = Writer::new();
		name::encode(&mut w, &decoded)?;
		w.into_vec()
	} else {
		r.bytes(rdlen)?.to_vec()
	};

	Ok(Rr { rname, rtype, rclass, rttl, rdata })
}

fn encode_rr(w: &mut Writer, rr: &Rr) -> Result {
	name::encode(w, &rr.rname)?;
	w.u16(rr.rtype);
	w.u16(rr.rclass);
	w.u32(rr.rttl);
	w.u16(len_u16(rr.rdata.len())?);
	w.bytes(&rr.rdata);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn a_record(name: &str, ip: [u8; 4]) -> Rr {
		Rr::new(name, 1, 1, 60, ip)
	}

	#[test]
	fn message_round_trips() {
		let msg = Message {
			id: 0x1234,
			flags: 0x8180,
			questions: vec![Question::new("example.com.", 1, 1)],
			answers: vec![a_record("example.com.", [93, 184, 216, 34])],
			authority: vec![],
			additional: vec![],
		};

		let bytes = msg.serialize().unwrap();
		let parsed = Message::parse(&bytes).unwrap();

		assert_eq!(parsed, msg);
	}

	#[test]
	fn header_counts_match_actual_section_lengths() {
		let msg = Message {
			id: 1,
			flags: 0,
			questions: vec![Question::new("a.", 1, 1), Question::new("b.", 1, 1)],
			answers: vec![a_record("a.", [1, 2, 3, 4])],
			authority: vec![],
			additional: vec![],
		};

		let bytes = msg.serialize().unwrap();
		assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 2); // qdcount
		assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 1); // ancount
	}

	#[test]
	fn cname_rdata_is_canonicalized_on_parse() {
		// Build a packet where the answer's CNAME rdata is a compression
		// pointer back into the question's qname.
		let mut w = Writer::new();
		w.u16(1); // id
		w.u16(0x8180); // flags
		w.u16(1); // qdcount
		w.u16(1); // ancount
		w.u16(0);
		w.u16(0);
		name::encode(&mut w, "a.test.").unwrap(); // offset 12
		w.u16(5); // CNAME
		w.u16(1);
		// answer
		w.bytes(&[0xC0, 12]); // rname: pointer to "a.test."
		w.u16(5); // CNAME
		w.u16(1);
		w.u32(60);
		w.u16(2);
		w.bytes(&[0xC0, 12]); // rdata: pointer to "a.test." again

		let bytes = w.into_vec();
		let msg = Message::parse(&bytes).unwrap();

		assert_eq!(msg.answers[0].rdata_name().unwrap(), "a.test.");
		// Re-serializing must not emit a pointer.
		assert_eq!(msg.answers[0].rdata, {
			let mut w = Writer::new();
			name::encode(&mut w, "a.test.").unwrap();
			w.into_vec()
		});
	}

	#[test]
	fn non_name_rdata_is_carried_verbatim() {
		let rr = a_record("host.test.", [10, 0, 0, 1]);
		let mut w = Writer::new();
		encode_rr(&mut w, &rr).unwrap();
		let bytes = w.into_vec();
		let mut r = Reader::new(&bytes);
		let decoded = decode_rr(&mut r).unwrap();
		assert_eq!(decoded.rdata, [10, 0, 0, 1]);
	}
}
