use std::path::PathBuf;

use selog::{LogQuery, LogStore};
use serde::Deserialize;

// ── Global config ($SEBOOT_CONFIG or /etc/seboot/config.toml) ───────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Directory holding the log files and the PID guard.
	#[serde(default = "default_state_dir")]
	pub state_dir: PathBuf,
	/// Active log file name inside `state_dir`.
	#[serde(default = "default_log_file")]
	pub log_file: String,
	/// Single-generation backup log file name inside `state_dir`.
	#[serde(default = "default_backup_file")]
	pub backup_file: String,
	/// PID guard file name inside `state_dir`.
	#[serde(default = "default_pid_file")]
	pub pid_file: String,
	/// Directory scanned for boot units.
	#[serde(default = "default_unit_dir")]
	pub unit_dir: PathBuf,
	/// Rotation threshold for the active log, bytes.
	#[serde(default = "default_max_log_size")]
	pub max_log_size: u64,
	/// Output buffer capacity for `seboot log`, bytes.
	#[serde(default = "default_read_capacity")]
	pub read_capacity: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			state_dir: default_state_dir(),
			log_file: default_log_file(),
			backup_file: default_backup_file(),
			pid_file: default_pid_file(),
			unit_dir: default_unit_dir(),
			max_log_size: default_max_log_size(),
			read_capacity: default_read_capacity(),
		}
	}
}

fn default_state_dir() -> PathBuf {
	PathBuf::from("/var/seboot")
}
fn default_log_file() -> String {
	"seboot.log".into()
}
fn default_backup_file() -> String {
	"seboot_last.log".into()
}
fn default_pid_file() -> String {
	"seboot.pid".into()
}
fn default_unit_dir() -> PathBuf {
	PathBuf::from("/etc/seboot")
}
fn default_max_log_size() -> u64 {
	selog::store::MAX_FILE_SIZE
}
fn default_read_capacity() -> usize {
	selog::query::DEFAULT_READ_CAPACITY
}

impl Config {
	pub fn load() -> Config {
		let path = std::env::var("SEBOOT_CONFIG")
			.map(PathBuf::from)
			.unwrap_or_else(|_| PathBuf::from("/etc/seboot/config.toml"));

		if path.exists() {
			match std::fs::read_to_string(&path) {
				Ok(content) => match toml::from_str(&content) {
					Ok(config) => return config,
					Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
				},
				Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
			}
		}
		Config::default()
	}

	pub fn log_path(&self) -> PathBuf {
		self.state_dir.join(&self.log_file)
	}

	pub fn backup_path(&self) -> PathBuf {
		self.state_dir.join(&self.backup_file)
	}

	pub fn pid_path(&self) -> PathBuf {
		self.state_dir.join(&self.pid_file)
	}

	pub fn store(&self) -> LogStore {
		LogStore::new(self.log_path(), self.backup_path()).with_max_size(self.max_log_size)
	}

	pub fn query(&self) -> LogQuery {
		LogQuery::new(self.log_path(), self.backup_path())
	}
}
