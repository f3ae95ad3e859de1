//! The UDP server (spec §4.5): one accept loop, one handler thread per
//! datagram.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use codec::{flags, Message};
use log::warn;
use runtime::shutdown;

use crate::resolver::Resolver;

/// Short enough that the accept loop notices a shutdown request promptly,
/// long enough not to spin the CPU.
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(200);

/// Classic DNS UDP datagrams are capped at 512 bytes (spec §6).
const MAX_DATAGRAM: usize = 512;

pub struct Server {
	socket: Arc<UdpSocket>,
	resolver: Arc<Resolver>,
}

impl Server {
	pub fn new(socket: Arc<UdpSocket>, resolver: Arc<Resolver>) -> Self {
		let _ = socket.set_read_timeout(Some(ACCEPT_TIMEOUT));
		Self { socket, resolver }
	}

	/// The accept loop: read one datagram at a time, spawn a fresh handler
	/// for each, until the shutdown flag is observed.
	pub fn run(&self) {
		let mut buf = [0u8; MAX_DATAGRAM];

		while !shutdown::requested() {
			let (n, addr) = match self.socket.recv_from(&mut buf) {
				Ok(v) => v,
				Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => continue,
				Err(err) => {
					warn!("failed to receive datagram: {err}");
					continue;
				}
			};

			let datagram = buf[..n].to_vec();
			let socket = self.socket.clone();
			let resolver = self.resolver.clone();

			thread::spawn(move || handle(&socket, &resolver, addr, &datagram));
		}
	}

	/// Blocks for exactly one inbound datagram and answers it on the
	/// current thread. `run` takes the concurrent, thread-per-datagram path
	/// instead; this is the deterministic single-shot building block tests
	/// use to drive the same `handle` logic without the shutdown flag.
	pub fn handle_once(&self) -> io::Result<()> {
		let mut buf = [0u8; MAX_DATAGRAM];
		let (n, addr) = self.socket.recv_from(&mut buf)?;
		handle(&self.socket, &self.resolver, addr, &buf[..n]);
		Ok(())
	}
}

fn handle(socket: &UdpSocket, resolver: &Resolver, addr: SocketAddr, datagram: &[u8]) {
	let request = match Message::parse(datagram) {
		Ok(request) => request,
		Err(()) => {
			warn!("dropping malformed datagram from {addr}");
			return;
		}
	};

	let mut response = Message {
		id: request.id,
		flags: flags::RESPONSE,
		questions: request.questions.clone(),
		answers: Vec::new(),
		authority: Vec::new(),
		additional: Vec::new(),
	};

	for question in &request.questions {
		response.answers.extend(resolver.resolve(question));
	}

	let bytes = match response.serialize() {
		Ok(bytes) => bytes,
		Err(()) => {
			warn!("failed to serialize response to {addr}");
			return;
		}
	};

	if let Err(err) = socket.send_to(&bytes, addr) {
		warn!("failed to send response to {addr}: {err}");
	}
}
