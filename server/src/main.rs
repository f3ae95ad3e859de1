use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use log::{error, info};
use server::{console, guard, Resolver, Server, StartupError};

const CACHE_FILE: &str = "cache";

fn main() {
	runtime::init_logging();

	let Some(forwarder_host) = std::env::args().nth(1) else {
		eprintln!("Usage: dnsfwd <forwarder>");
		std::process::exit(-1);
	};

	let (socket, forwarder_ip) = match start(&forwarder_host) {
		Ok(v) => v,
		Err(err) => {
			error!("failed to start server: {err}");
			std::process::exit(-1);
		}
	};

	if runtime::shutdown::install_ctrlc_handler().is_err() {
		info!("continuing without a Ctrl+C handler; use the \"exit\" console command to shut down");
	}

	let cache = Arc::new(cache::persist::load(CACHE_FILE));
	let forwarder_enabled = Arc::new(AtomicBool::new(true));
	let resolver = Arc::new(Resolver::new(cache.clone(), forwarder_ip, forwarder_enabled.clone()));

	let socket = Arc::new(socket);
	let server = Server::new(socket, resolver);

	let handle = thread::spawn(move || server.run());

	info!("serving DNS on :53, forwarding cache misses to {forwarder_ip}");
	console::run(&cache, &forwarder_enabled);

	handle.join().expect("accept loop thread panicked");

	if cache::persist::save(CACHE_FILE, &cache).is_err() {
		error!("cache was not saved; starting next time with an empty cache");
	}

	println!("Bye!");
}

/// Resolves the forwarder host, binds the listening socket, and runs the
/// self-forwarder guard — the three ways startup can fail fatally (spec
/// §7).
fn start(forwarder_host: &str) -> Result<(UdpSocket, std::net::IpAddr), StartupError> {
	let forwarder_ip = (forwarder_host, 0)
		.to_socket_addrs()
		.ok()
		.and_then(|mut addrs| addrs.next())
		.map(|addr| addr.ip())
		.ok_or_else(|| StartupError::ForwarderUnresolvable(forwarder_host.to_string()))?;

	let socket = UdpSocket::bind("0.0.0.0:53").map_err(StartupError::PortInUse)?;

	guard::check(&socket, forwarder_ip)?;

	Ok((socket, forwarder_ip))
}
