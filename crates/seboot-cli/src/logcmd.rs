use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use selog::{FormatFlags, LogFilter};

use crate::config::Config;

/// Flags for `seboot log`, comma-separated lists throughout.
#[derive(Debug, Parser)]
#[command(name = "seboot log", about = "query the seboot log", disable_version_flag = true)]
pub struct LogArgs {
	/// Start timestamp (milliseconds)
	#[arg(short = 's', long = "start-time", default_value_t = 0)]
	pub start_time: i64,

	/// End timestamp (milliseconds)
	#[arg(short = 'e', long = "end-time", default_value_t = 0)]
	pub end_time: i64,

	/// Include log types
	#[arg(short = 't', long = "type", value_delimiter = ',')]
	pub types: Vec<i32>,

	/// Exclude log types
	#[arg(short = 'x', long = "exclude-type", value_delimiter = ',')]
	pub exclude_types: Vec<i32>,

	/// Include process IDs
	#[arg(short = 'p', long = "pid", value_delimiter = ',')]
	pub pids: Vec<i32>,

	/// Exclude process IDs
	#[arg(short = 'X', long = "exclude-pid", value_delimiter = ',')]
	pub exclude_pids: Vec<i32>,

	/// Include paths
	#[arg(short = 'P', long = "path", value_delimiter = ',')]
	pub paths: Vec<String>,

	/// Exclude paths
	#[arg(short = 'E', long = "exclude-path", value_delimiter = ',')]
	pub exclude_paths: Vec<String>,

	/// Include names
	#[arg(short = 'n', long = "name", value_delimiter = ',')]
	pub names: Vec<String>,

	/// Exclude names
	#[arg(short = 'N', long = "exclude-name", value_delimiter = ',')]
	pub exclude_names: Vec<String>,

	/// Maximum number of log entries to return
	#[arg(short = 'c', long = "count", default_value_t = 0)]
	pub count: usize,

	/// Use human-readable time format
	#[arg(short = 'H', long = "human-time")]
	pub human_time: bool,

	/// Show log types by name instead of code
	#[arg(long = "human-type")]
	pub human_type: bool,

	/// Do not show timestamp
	#[arg(long = "no-timestamp")]
	pub no_timestamp: bool,

	/// Do not show log type
	#[arg(long = "no-type")]
	pub no_type: bool,

	/// Do not show process ID
	#[arg(long = "no-pid")]
	pub no_pid: bool,

	/// Do not show path
	#[arg(long = "no-path")]
	pub no_path: bool,

	/// Do not show name
	#[arg(long = "no-name")]
	pub no_name: bool,

	/// Output to file (default: stdout)
	#[arg(short = 'o', long = "output")]
	pub output: Option<PathBuf>,
}

impl LogArgs {
	pub fn into_filter(self) -> LogFilter {
		LogFilter {
			start_ms: self.start_time,
			end_ms: self.end_time,
			types: self.types,
			exclude_types: self.exclude_types,
			pids: self.pids,
			exclude_pids: self.exclude_pids,
			paths: self.paths,
			exclude_paths: self.exclude_paths,
			names: self.names,
			exclude_names: self.exclude_names,
			limit: self.count,
			format: FormatFlags {
				timestamp: !self.no_timestamp,
				rtype: !self.no_type,
				pid: !self.no_pid,
				path: !self.no_path,
				name: !self.no_name,
				human_time: self.human_time,
				human_type: self.human_type,
			},
		}
	}
}

pub fn run(cfg: &Config, args: &[String]) -> i32 {
	let parsed = match LogArgs::try_parse_from(
		std::iter::once("seboot log".to_string()).chain(args.iter().cloned()),
	) {
		Ok(p) => p,
		Err(e) => {
			// clap renders both --help output and usage errors.
			let _ = e.print();
			return if e.use_stderr() { 1 } else { 0 };
		}
	};

	let output = parsed.output.clone();
	let filter = parsed.into_filter();

	let result = match cfg.query().read(&filter, cfg.read_capacity) {
		Ok(out) => out,
		Err(e) => {
			eprintln!("seboot: {}", e);
			return 1;
		}
	};

	match output {
		Some(path) => {
			let mut file = match std::fs::File::create(&path) {
				Ok(f) => f,
				Err(e) => {
					eprintln!("seboot: open {}: {}", path.display(), e);
					return 1;
				}
			};
			if let Err(e) = file.write_all(result.text.as_bytes()) {
				eprintln!("seboot: write {}: {}", path.display(), e);
				return 1;
			}
		}
		None => {
			print!("{}", result.text);
		}
	}

	0
}
