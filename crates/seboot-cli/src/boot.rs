use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use selog::{LogStore, RecordType};
use seproc::{daemonize, spawn_captured, PidFile, RunningChild};

use crate::config::Config;

const BOOT_PATH: &str = "/";
const BOOT_NAME: &str = "seboot";

/// One discovered boot script: `DD_TT_<suffix>`, two-digit order, two-digit
/// timeout in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootUnit {
	pub order: u32,
	pub timeout_secs: u64,
	pub path: PathBuf,
}

/// Run the boot sequence. Single-instance by PID-file guard; the surviving
/// process daemonizes, runs every unit in order, reaps stragglers, then
/// idles forever so the guard stays live for the host session.
pub fn run_boot(cfg: &Config) {
	let store = cfg.store();
	let guard = PidFile::new(cfg.pid_path());

	// Another boot run is active; a stale pid is no guard at all.
	if guard.is_held() {
		return;
	}

	if let Err(e) = daemonize() {
		boot_log(&store, &format!("daemonize failed!: {}", e));
		return;
	}

	if let Err(e) = guard.write_current() {
		boot_log(&store, &e.to_string());
		return;
	}

	let rt = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			boot_log(&store, &e.to_string());
			return;
		}
	};

	rt.block_on(async {
		let units = match discover_units(&cfg.unit_dir, &store) {
			Ok(units) => units,
			Err(e) => {
				boot_log(&store, &e.to_string());
				return;
			}
		};

		let leftovers = run_units(&store, units).await;

		// Final reap: anything that outlived its timeout, status discarded.
		for child in leftovers {
			child.wait().await;
		}

		// Not a run-to-completion job; keep the guard for the session.
		std::future::pending::<()>().await;
	});
}

/// Scan the unit directory (created with permissive mode when absent) in
/// directory order. Names shorter than 6 bytes are skipped silently; longer
/// names that break the `DD_TT_` form are logged as format errors and
/// skipped. The result is stably sorted by order.
pub fn discover_units(dir: &Path, store: &LogStore) -> io::Result<Vec<BootUnit>> {
	if !dir.is_dir() {
		std::fs::DirBuilder::new()
			.recursive(true)
			.mode(0o777)
			.create(dir)?;
	}

	let mut units = Vec::new();
	for entry in std::fs::read_dir(dir)?.flatten() {
		let file_name = entry.file_name();
		let name = file_name.to_string_lossy();
		if name.len() < 6 {
			continue;
		}
		match parse_unit_name(&name) {
			Some((order, timeout_secs)) => units.push(BootUnit {
				order,
				timeout_secs,
				path: entry.path(),
			}),
			None => boot_log(store, &format!("{} :file format err!", name)),
		}
	}

	sort_units(&mut units);
	Ok(units)
}

/// Stable sort: equal orders keep their directory-scan order.
pub fn sort_units(units: &mut [BootUnit]) {
	units.sort_by_key(|u| u.order);
}

/// Parse `DD_TT_<suffix>`: bytes 0,1,3,4 decimal digits, bytes 2,5
/// underscores, length at least 6. Returns (order, timeout seconds).
pub fn parse_unit_name(name: &str) -> Option<(u32, u64)> {
	let b = name.as_bytes();
	if b.len() < 6 {
		return None;
	}
	if !b[0].is_ascii_digit()
		|| !b[1].is_ascii_digit()
		|| b[2] != b'_'
		|| !b[3].is_ascii_digit()
		|| !b[4].is_ascii_digit()
		|| b[5] != b'_'
	{
		return None;
	}
	let order = u32::from((b[0] - b'0') * 10 + (b[1] - b'0'));
	let timeout = u64::from((b[3] - b'0') * 10 + (b[4] - b'0'));
	Some((order, timeout))
}

/// Start each unit in order and wait at most its timeout before moving on.
/// A timed-out unit is never killed; its handle is returned so the caller
/// can reap it once it exits on its own. Ordering therefore guarantees
/// start order only, not completion order.
pub async fn run_units(store: &LogStore, units: Vec<BootUnit>) -> Vec<RunningChild> {
	let mut leftovers = Vec::new();

	for unit in units {
		let argv = vec![unit.path.to_string_lossy().into_owned()];
		let mut child = match spawn_captured(store, &argv).await {
			Ok(c) => c,
			// Already logged as a Process record with the OS error.
			Err(_) => continue,
		};

		if !child.wait_timeout(Duration::from_secs(unit.timeout_secs)).await {
			boot_log(store, &format!("{} :timeout!", unit.path.display()));
			leftovers.push(child);
		}
	}

	leftovers
}

fn boot_log(store: &LogStore, message: &str) {
	if let Err(e) = store.append(
		RecordType::Boot,
		std::process::id() as i32,
		BOOT_PATH,
		BOOT_NAME,
		message,
	) {
		tracing::warn!("boot log append failed: {}", e);
	}
}
