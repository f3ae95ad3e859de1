//! The interactive stdin console: `exit`, `cache`, `forwarder_on`,
//! `forwarder_off` (spec §6). Runs on the main thread while the accept loop
//! runs on its own.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cache::Cache;
use log::info;
use runtime::shutdown;

/// Reads console commands until `exit`, returning control to the caller so
/// it can join the server thread and persist the cache.
pub fn run(cache: &Cache, forwarder_enabled: &Arc<AtomicBool>) {
	let stdin = io::stdin();

	for line in stdin.lock().lines() {
		let Ok(line) = line else { break };

		match line.trim() {
			"exit" => {
				shutdown::request();
				break;
			}
			"cache" => {
				println!("Cache status:");
				print!("{}", cache.status());
			}
			"forwarder_on" => {
				forwarder_enabled.store(true, Ordering::Relaxed);
				info!("forwarder enabled");
			}
			"forwarder_off" => {
				forwarder_enabled.store(false, Ordering::Relaxed);
				info!("forwarder disabled");
			}
			other if !other.is_empty() => {
				println!("unknown command: {other}");
			}
			_ => {}
		}
	}
}
