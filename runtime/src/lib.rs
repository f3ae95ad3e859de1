mod logger;
pub mod shutdown;

pub use logger::Logger;

use log::LevelFilter;

/// Installs the process-wide logger, reading the level from `DNSFWD_LOG`
/// (defaulting to `info`) — the one environment-level setting this
/// forwarder reads, in keeping with the teacher's lack of a broader config
/// layer.
pub fn init_logging() {
	let level = std::env::var("DNSFWD_LOG").ok().and_then(|s| s.parse().ok()).unwrap_or(LevelFilter::Info);

	if log::set_boxed_logger(Box::new(Logger)).is_ok() {
		log::set_max_level(level);
	}
}
