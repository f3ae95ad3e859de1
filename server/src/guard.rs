//! The self-forwarder guard (spec §4.6): a one-shot startup probe that
//! detects a configured forwarder which is this very server.

use std::net::{IpAddr, UdpSocket};
use std::time::Duration;

use codec::{Message, Question};
use log::{info, warn};

use crate::error::StartupError;

/// The probe uses a fixed id and a synthetic qname that will never be a
/// real lookup, so a byte-equal echoed question is unambiguous evidence
/// that our own probe query is what came back.
const PROBE_ID: u16 = 0x6969;
const PROBE_QNAME: &str = "recursion.check.packet.";
const PROBE_TIMEOUT: Duration = Duration::from_secs(4);

/// Sends the probe query to `forwarder` and listens on `listener` (the
/// server's own not-yet-running listening socket) for it to come back.
///
/// If `forwarder` resolves to this machine, the outbound probe is
/// delivered straight back to `listener` instead of leaving the host, and
/// we'll see our own probe question arrive as if it were a reply.
/// Timeouts and unrelated datagrams are ignored — absence of evidence is
/// not evidence of a loop (spec §4.6).
pub fn check(listener: &UdpSocket, forwarder: IpAddr) -> Result<(), StartupError> {
	let question = Question::new(PROBE_QNAME, 1, 1);

	let probe = Message {
		id: PROBE_ID,
		flags: 0,
		questions: vec![question.clone()],
		answers: vec![],
		authority: vec![],
		additional: vec![],
	};

	let bytes = probe.serialize().expect("a hand-built probe message always serializes");

	let probe_socket = UdpSocket::bind("0.0.0.0:0").map_err(StartupError::PortInUse)?;

	if let Err(err) = probe_socket.send_to(&bytes, (forwarder, 53)) {
		warn!("could not send self-loop probe to {forwarder}: {err}");
		return Ok(());
	}

	let previous_timeout = listener.read_timeout().unwrap_or(None);
	let _ = listener.set_read_timeout(Some(PROBE_TIMEOUT));

	let mut buf = [0u8; 512];
	let result = listener.recv_from(&mut buf);

	let _ = listener.set_read_timeout(previous_timeout);

	let Ok((n, _)) = result else {
		info!("no self-loop probe reply within {PROBE_TIMEOUT:?}; assuming no loop");
		return Ok(());
	};

	if is_echoed_probe(&buf[..n], &question) {
		Err(StartupError::SelfLoop)
	} else {
		Ok(())
	}
}

/// True when `bytes` parses into a message carrying exactly the probe
/// question back — the signature of our own probe bouncing off a
/// forwarder that is really this host.
fn is_echoed_probe(bytes: &[u8], question: &Question) -> bool {
	matches!(Message::parse(bytes), Ok(reply) if reply.questions == [question.clone()])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn a_reply_carrying_the_probe_question_is_recognised_as_an_echo() {
		let question = Question::new(PROBE_QNAME, 1, 1);
		let probe = Message {
			id: PROBE_ID,
			flags: 0,
			questions: vec![question.clone()],
			answers: vec![],
			authority: vec![],
			additional: vec![],
		};

		assert!(is_echoed_probe(&probe.serialize().unwrap(), &question));
	}

	#[test]
	fn an_unrelated_reply_is_not_mistaken_for_an_echo() {
		let question = Question::new(PROBE_QNAME, 1, 1);
		let unrelated = Message {
			id: 1,
			flags: 0,
			questions: vec![Question::new("www.example.com.", 1, 1)],
			answers: vec![],
			authority: vec![],
			additional: vec![],
		};

		assert!(!is_echoed_probe(&unrelated.serialize().unwrap(), &question));
	}

	#[test]
	fn garbage_bytes_are_not_mistaken_for_an_echo() {
		let question = Question::new(PROBE_QNAME, 1, 1);
		assert!(!is_echoed_probe(&[0xff, 0x00, 0x01], &question));
	}
}
