use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use crate::record::{self, LogRecord};
use crate::store::MAX_FILE_SIZE;

/// Default output capacity handed to [`LogQuery::read`] by the CLI.
pub const DEFAULT_READ_CAPACITY: usize = (MAX_FILE_SIZE as usize) * 3;

/// Which fields to render and how. All fields shown, machine form, by
/// default.
#[derive(Debug, Clone)]
pub struct FormatFlags {
	pub timestamp: bool,
	pub rtype: bool,
	pub pid: bool,
	pub path: bool,
	pub name: bool,
	pub human_time: bool,
	pub human_type: bool,
}

impl Default for FormatFlags {
	fn default() -> Self {
		Self {
			timestamp: true,
			rtype: true,
			pid: true,
			path: true,
			name: true,
			human_time: false,
			human_type: false,
		}
	}
}

/// A query specification. Empty lists and non-positive bounds mean "no
/// restriction"; `limit` of 0 means unlimited. Built once from parsed CLI
/// input and not mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
	pub start_ms: i64,
	pub end_ms: i64,
	pub types: Vec<i32>,
	pub exclude_types: Vec<i32>,
	pub pids: Vec<i32>,
	pub exclude_pids: Vec<i32>,
	pub paths: Vec<String>,
	pub exclude_paths: Vec<String>,
	pub names: Vec<String>,
	pub exclude_names: Vec<String>,
	pub limit: usize,
	pub format: FormatFlags,
}

impl LogFilter {
	/// True when the record survives every filter rule. Each rule is a
	/// short-circuit reject; an exclude match drops the record even when an
	/// include rule also matches it.
	pub fn matches(&self, rec: &LogRecord) -> bool {
		if self.start_ms > 0 && rec.timestamp_ms < self.start_ms {
			return false;
		}
		if self.end_ms > 0 && rec.timestamp_ms > self.end_ms {
			return false;
		}

		let code = rec.rtype.code();
		if !self.types.is_empty() && !self.types.contains(&code) {
			return false;
		}
		if self.exclude_types.contains(&code) {
			return false;
		}

		if !self.pids.is_empty() && !self.pids.contains(&rec.pid) {
			return false;
		}
		if self.exclude_pids.contains(&rec.pid) {
			return false;
		}

		if !self.paths.is_empty() && !self.paths.iter().any(|p| p == &rec.path) {
			return false;
		}
		if self.exclude_paths.iter().any(|p| p == &rec.path) {
			return false;
		}

		if !self.names.is_empty() && !self.names.iter().any(|n| n == &rec.name) {
			return false;
		}
		if self.exclude_names.iter().any(|n| n == &rec.name) {
			return false;
		}

		true
	}
}

/// Render one record per the format flags: bracketed fields in fixed order,
/// message after a colon.
pub fn format_record(rec: &LogRecord, flags: &FormatFlags) -> String {
	let mut out = String::new();

	if flags.timestamp {
		if flags.human_time {
			out.push_str(&format!("[{}]", record::human_time(rec.timestamp_ms)));
		} else {
			out.push_str(&format!("[{}]", rec.timestamp_ms));
		}
	}
	if flags.rtype {
		if flags.human_type {
			out.push_str(&format!("[{}]", rec.rtype.as_str()));
		} else {
			out.push_str(&format!("[{}]", rec.rtype.code()));
		}
	}
	if flags.pid {
		out.push_str(&format!("[{}]", rec.pid));
	}
	if flags.path {
		out.push_str(&format!("[{}]", rec.path));
	}
	if flags.name {
		out.push_str(&format!("[{}]", rec.name));
	}

	out.push(':');
	out.push_str(&rec.message);
	out.push('\n');
	out
}

#[derive(Debug)]
pub enum QueryError {
	/// Rendered output would not fit the caller's capacity. No partial
	/// results are returned.
	Overflow,
	/// The active log file could not be opened and nothing matched from the
	/// backup.
	NoLog(io::Error),
}

impl std::fmt::Display for QueryError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			QueryError::Overflow => write!(f, "output buffer too small"),
			QueryError::NoLog(e) => write!(f, "open log: {}", e),
		}
	}
}

impl std::error::Error for QueryError {}

#[derive(Debug)]
pub struct QueryOutput {
	pub text: String,
	pub matched: usize,
}

enum Scan {
	Done,
	LimitReached,
}

/// Read-only view over the backup and active log files.
#[derive(Debug, Clone)]
pub struct LogQuery {
	active: PathBuf,
	backup: PathBuf,
}

impl LogQuery {
	pub fn new(active: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
		Self {
			active: active.into(),
			backup: backup.into(),
		}
	}

	/// Scan backup first, then active, rendering matches into a buffer
	/// bounded by `capacity`. Lines that do not parse are skipped. Hitting
	/// the filter's limit inside the backup file ends the read without
	/// opening the active file.
	pub fn read(&self, filter: &LogFilter, capacity: usize) -> Result<QueryOutput, QueryError> {
		let mut out = QueryOutput {
			text: String::new(),
			matched: 0,
		};

		if let Ok(file) = File::open(&self.backup) {
			if let Scan::LimitReached = scan_file(file, filter, capacity, &mut out)? {
				return Ok(out);
			}
		}

		let file = match File::open(&self.active) {
			Ok(f) => f,
			Err(e) => {
				if out.matched > 0 {
					return Ok(out);
				}
				return Err(QueryError::NoLog(e));
			}
		};
		scan_file(file, filter, capacity, &mut out)?;
		Ok(out)
	}
}

fn scan_file(
	file: File,
	filter: &LogFilter,
	capacity: usize,
	out: &mut QueryOutput,
) -> Result<Scan, QueryError> {
	let reader = BufReader::new(file);
	for line in reader.lines() {
		let line = match line {
			Ok(l) => l,
			// Non-UTF-8 garbage is just a non-matching line.
			Err(e) if e.kind() == io::ErrorKind::InvalidData => continue,
			Err(_) => break,
		};

		let rec = match LogRecord::parse(&line) {
			Some(r) => r,
			None => continue,
		};
		if !filter.matches(&rec) {
			continue;
		}

		let rendered = format_record(&rec, &filter.format);
		if out.text.len() + rendered.len() >= capacity {
			return Err(QueryError::Overflow);
		}
		out.text.push_str(&rendered);
		out.matched += 1;

		if filter.limit > 0 && out.matched >= filter.limit {
			return Ok(Scan::LimitReached);
		}
	}
	Ok(Scan::Done)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::RecordType;

	fn rec(ts: i64, rtype: RecordType, pid: i32, path: &str, name: &str) -> LogRecord {
		LogRecord {
			timestamp_ms: ts,
			rtype,
			pid,
			path: path.into(),
			name: name.into(),
			message: "m".into(),
		}
	}

	#[test]
	fn empty_filter_matches_everything() {
		let f = LogFilter::default();
		assert!(f.matches(&rec(1, RecordType::Boot, 1, "/", "x")));
	}

	#[test]
	fn time_bounds_inclusive() {
		let f = LogFilter {
			start_ms: 100,
			end_ms: 200,
			..Default::default()
		};
		assert!(!f.matches(&rec(99, RecordType::Boot, 1, "/", "x")));
		assert!(f.matches(&rec(100, RecordType::Boot, 1, "/", "x")));
		assert!(f.matches(&rec(200, RecordType::Boot, 1, "/", "x")));
		assert!(!f.matches(&rec(201, RecordType::Boot, 1, "/", "x")));
	}

	#[test]
	fn exclude_wins_over_include() {
		let f = LogFilter {
			pids: vec![7],
			exclude_pids: vec![7],
			..Default::default()
		};
		assert!(!f.matches(&rec(1, RecordType::Process, 7, "/", "x")));

		let f = LogFilter {
			names: vec!["sh".into()],
			exclude_names: vec!["sh".into()],
			..Default::default()
		};
		assert!(!f.matches(&rec(1, RecordType::Process, 7, "/bin/sh", "sh")));
	}

	#[test]
	fn type_and_path_filters() {
		let f = LogFilter {
			types: vec![0],
			..Default::default()
		};
		assert!(f.matches(&rec(1, RecordType::Process, 1, "/", "x")));
		assert!(!f.matches(&rec(1, RecordType::Boot, 1, "/", "x")));

		let f = LogFilter {
			exclude_paths: vec!["/bin/sh".into()],
			..Default::default()
		};
		assert!(!f.matches(&rec(1, RecordType::Process, 1, "/bin/sh", "sh")));
		assert!(f.matches(&rec(1, RecordType::Process, 1, "/bin/ls", "ls")));
	}

	#[test]
	fn format_default_is_wire_form() {
		let r = rec(5, RecordType::Boot, 9, "/p", "n");
		assert_eq!(format_record(&r, &FormatFlags::default()), "[5][1][9][/p][n]:m\n");
	}

	#[test]
	fn format_suppressed_fields() {
		let r = rec(5, RecordType::Boot, 9, "/p", "n");
		let flags = FormatFlags {
			timestamp: false,
			pid: false,
			path: false,
			..Default::default()
		};
		assert_eq!(format_record(&r, &flags), "[1][n]:m\n");
	}

	#[test]
	fn format_human_type_and_time() {
		let r = rec(0, RecordType::Process, 9, "/p", "n");
		let flags = FormatFlags {
			human_time: true,
			human_type: true,
			..Default::default()
		};
		assert_eq!(
			format_record(&r, &flags),
			"[1970-01-01 00:00:00:000000][process][9][/p][n]:m\n"
		);
	}
}
