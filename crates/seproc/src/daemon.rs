use std::io;
use std::path::{Path, PathBuf};

use nix::sys::signal::kill;
use nix::unistd::{fork, setsid, ForkResult, Pid};

/// Detach from the controlling terminal: fork (parent exits), start a new
/// session, fork again (session leader exits). The surviving process is an
/// orphaned non-session-leader with no controlling terminal.
///
/// Must run before any tokio runtime exists; forking a live runtime is not
/// sound.
pub fn daemonize() -> Result<(), nix::Error> {
	match unsafe { fork() }? {
		ForkResult::Parent { .. } => std::process::exit(0),
		ForkResult::Child => {}
	}

	setsid()?;

	match unsafe { fork() }? {
		ForkResult::Parent { .. } => std::process::exit(0),
		ForkResult::Child => {}
	}

	Ok(())
}

/// True when `pid` names a live process (signal 0 probe).
pub fn process_alive(pid: i32) -> bool {
	kill(Pid::from_raw(pid), None).is_ok()
}

/// Single-instance guard: a file holding one decimal pid.
///
/// The file is read without locking and never removed; staleness is decided
/// by a liveness probe, not by cleanup.
#[derive(Debug, Clone)]
pub struct PidFile {
	path: PathBuf,
}

impl PidFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn read(&self) -> Option<i32> {
		std::fs::read_to_string(&self.path)
			.ok()
			.and_then(|s| s.trim().parse().ok())
	}

	/// True when the file holds the pid of a live process. A missing file,
	/// garbage content, or a dead pid all count as "not held".
	pub fn is_held(&self) -> bool {
		self.read().is_some_and(process_alive)
	}

	pub fn write_current(&self) -> io::Result<()> {
		std::fs::write(&self.path, std::process::id().to_string())
	}
}
