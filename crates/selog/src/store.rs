use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::record::{self, RecordType};

/// Rotation threshold for the active log file.
pub const MAX_FILE_SIZE: u64 = 16 * 1024;

#[derive(Debug)]
pub enum StoreError {
	/// Active log file could not be opened.
	Open(io::Error),
	/// Exclusive lock could not be acquired.
	Lock(nix::Error),
	/// Copying the active file to the backup failed; the write was aborted.
	Rotate(io::Error),
	/// Write or metadata error on the locked file.
	Io(io::Error),
}

impl std::fmt::Display for StoreError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StoreError::Open(e) => write!(f, "open log: {}", e),
			StoreError::Lock(e) => write!(f, "lock log: {}", e),
			StoreError::Rotate(e) => write!(f, "rotate log: {}", e),
			StoreError::Io(e) => write!(f, "write log: {}", e),
		}
	}
}

impl std::error::Error for StoreError {}

/// Append-only store for the structured log.
///
/// Every append opens the active file, takes a blocking exclusive `flock`,
/// and holds it across the size-check/rotate/write sequence, so concurrent
/// appenders from any process never interleave lines and rotation is
/// serialized with writes.
#[derive(Debug, Clone)]
pub struct LogStore {
	active: PathBuf,
	backup: PathBuf,
	max_size: u64,
}

impl LogStore {
	pub fn new(active: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
		Self {
			active: active.into(),
			backup: backup.into(),
			max_size: MAX_FILE_SIZE,
		}
	}

	/// Override the rotation threshold.
	pub fn with_max_size(mut self, max_size: u64) -> Self {
		self.max_size = max_size;
		self
	}

	pub fn active_path(&self) -> &Path {
		&self.active
	}

	pub fn backup_path(&self) -> &Path {
		&self.backup
	}

	/// Append one record, rotating first if the active file has grown past
	/// the threshold. Rotation keeps exactly one backup generation: the
	/// prior backup is overwritten, the active file is truncated to empty.
	pub fn append(
		&self,
		rtype: RecordType,
		pid: i32,
		path: &str,
		name: &str,
		message: &str,
	) -> Result<(), StoreError> {
		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.active)
			.map_err(StoreError::Open)?;

		// Lock released on drop, including on every error path below.
		let mut lock =
			Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, e)| StoreError::Lock(e))?;

		let size = lock.metadata().map_err(StoreError::Io)?.len();
		if size > self.max_size {
			fs::copy(&self.active, &self.backup).map_err(StoreError::Rotate)?;
			lock.set_len(0).map_err(StoreError::Io)?;
		}

		let wire = record::render_wire(record::timestamp_ms(), rtype, pid, path, name, message);
		lock.write_all(&wire).map_err(StoreError::Io)?;
		Ok(())
	}
}
