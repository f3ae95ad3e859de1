//! The process-wide shutdown flag, set by either the console's `exit`
//! command or a Ctrl+C signal, and observed by the accept loop's read
//! timeout (spec §5).

use std::sync::atomic::{AtomicBool, Ordering};

use utils::error::*;

static REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn requested() -> bool {
	REQUESTED.load(Ordering::Relaxed)
}

pub fn request() {
	REQUESTED.store(true, Ordering::Relaxed);
}

/// Wires SIGINT to the same shutdown flag the console's `exit` command
/// sets, so a Ctrl+C still saves the cache before the process exits.
pub fn install_ctrlc_handler() -> Result {
	ctrlc::set_handler(request).map_err(|err| log::error!("failed to install Ctrl+C handler: {err}"))
}
