//! Header flag words this forwarder constructs itself.
//!
//! `Message::flags` is carried as an opaque `u16` (spec: "flags treated as
//! an opaque 16-bit word on input") so that every bit of a parsed message's
//! flags round-trips byte-for-byte, including reserved/unknown bits. These
//! constants are only for the flag words the forwarder itself emits.

/// Standard query, recursion desired (QR=0, opcode=0, RD=1).
pub const STANDARD_QUERY: u16 = 0x0100;

/// Response, not authoritative, recursion not available, rcode 0 (QR=1).
pub const RESPONSE: u16 = 0x8000;
