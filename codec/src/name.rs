//! Domain-name encoding and the pointer-compression scheme of RFC 1035
//! §4.1.4.
//!
//! A name on the wire is a sequence of `<length><label>` pairs terminated by
//! a zero length byte, where a length byte with both top bits set (`0xC0`)
//! introduces a 14-bit pointer: the remaining 6 bits of that byte plus the
//! next byte give an offset from the start of the packet at which decoding
//! continues. The in-memory form is the dotted string with a trailing dot
//! after every label, e.g. `example.com.`.

use collections::bytes::{Reader, Writer};
use log::warn;
use utils::error::*;

/// Pointer chains longer than this are treated as an attempt to loop the
/// parser; RFC 1035 doesn't bound this, but an unbounded chain is an easy
/// denial-of-service against the parser.
const MAX_POINTER_HOPS: u8 = 10;

/// Decodes a domain name starting at the reader's current position, which
/// is left just past the name's encoding (the pointer, if any, or the
/// terminating zero byte).
pub fn decode(r: &mut Reader) -> Result<String> {
	let name = decode_at(r, 0)?;

	// `decode_at` returns an empty string for the root name (a bare
	// terminating zero byte, possibly reached through a chain of
	// pointers); only the outermost call turns that into ".", so a
	// pointer to root nested inside a longer name contributes nothing
	// instead of an extra trailing dot.
	if name.is_empty() {
		Ok(".".to_string())
	} else {
		Ok(name)
	}
}

fn decode_at(r: &mut Reader, hops: u8) -> Result<String> {
	let mut name = String::new();

	loop {
		// The position of this length/pointer byte, used to reject
		// forward-pointing jumps.
		let mark = r.pos();
		let len = r.u8()?;

		match len >> 6 {
			// A length octet: read `len` bytes as a label.
			0b00 => {
				if len == 0 {
					return Ok(name);
				}

				let label = r.bytes(len as usize)?;

				let label = std::str::from_utf8(label).map_err(|_| warn!("DNS label at offset {mark} is not valid UTF-8"))?;

				name.push_str(label);
				name.push('.');
			}
			// A compression pointer: jump elsewhere in the packet and
			// decode the rest of the name from there, then stop — a
			// pointer always terminates the name that contains it.
			0b11 => {
				if hops >= MAX_POINTER_HOPS {
					warn!("DNS name compression exceeded {MAX_POINTER_HOPS} hops");
					return Err(());
				}

				let lo = r.u8()?;
				let target = (((len & 0x3f) as usize) << 8) | lo as usize;

				if target >= mark {
					warn!("DNS compression pointer at offset {mark} does not point strictly backward");
					return Err(());
				}

				let mut sub = r.at(target)?;
				name.push_str(&decode_at(&mut sub, hops + 1)?);

				return Ok(name);
			}
			_ => {
				warn!("DNS label at offset {mark} has a reserved length tag");
				return Err(());
			}
		}
	}
}

/// Encodes a domain name with no compression: every caller on the output
/// path accepts uncompressed names, so this implementation never emits a
/// pointer (spec §4.1).
pub fn encode(w: &mut Writer, name: &str) -> Result {
	for label in name.trim_end_matches('.').split('.') {
		if label.is_empty() {
			continue;
		}

		let bytes = label.as_bytes();

		if bytes.len() > 63 {
			warn!("DNS label {label:?} exceeds 63 bytes");
			return Err(());
		}

		w.u8(bytes.len() as u8);
		w.bytes(bytes);
	}

	w.u8(0);

	Ok(())
}
