use std::fmt;

/// Fatal startup failures (spec §7): the one place this forwarder needs a
/// human-readable reason to escape the function that detected it, so
/// `main` can print it and exit `-1`.
#[derive(Debug)]
pub enum StartupError {
	PortInUse(std::io::Error),
	ForwarderUnresolvable(String),
	SelfLoop,
}

impl fmt::Display for StartupError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			StartupError::PortInUse(err) => write!(f, "could not bind UDP port 53: {err}"),
			StartupError::ForwarderUnresolvable(host) => write!(f, "forwarder host {host:?} could not be resolved"),
			StartupError::SelfLoop => write!(f, "configured forwarder is this server itself"),
		}
	}
}

impl std::error::Error for StartupError {}
