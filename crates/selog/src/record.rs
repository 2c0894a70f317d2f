use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum bytes accepted for the path and name fields.
pub const MAX_FIELD: usize = 256;
/// Maximum bytes kept of a record's message.
pub const MAX_MESSAGE: usize = 1024;
/// Hard cap on one rendered record line, newline included.
pub const MAX_RECORD: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
	Process = 0,
	Boot = 1,
}

impl RecordType {
	pub fn code(self) -> i32 {
		self as i32
	}

	pub fn from_code(code: i32) -> Option<Self> {
		match code {
			0 => Some(RecordType::Process),
			1 => Some(RecordType::Boot),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			RecordType::Process => "process",
			RecordType::Boot => "boot",
		}
	}
}

/// One structured log line.
///
/// `path` and `name` must not contain `[` or `]`, `message` must not contain
/// a newline. The write path does not sanitize; callers own that contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
	pub timestamp_ms: i64,
	pub rtype: RecordType,
	pub pid: i32,
	pub path: String,
	pub name: String,
	pub message: String,
}

/// Milliseconds since the Unix epoch.
pub fn timestamp_ms() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

/// Render a record to its wire bytes, capped at [`MAX_RECORD`].
///
/// An oversized record is truncated in place and forced to end in a newline
/// rather than rejected.
pub fn render_wire(
	timestamp_ms: i64,
	rtype: RecordType,
	pid: i32,
	path: &str,
	name: &str,
	message: &str,
) -> Vec<u8> {
	let line = format!(
		"[{}][{}][{}][{}][{}]:{}\n",
		timestamp_ms,
		rtype.code(),
		pid,
		path,
		name,
		message
	);
	let mut bytes = line.into_bytes();
	if bytes.len() > MAX_RECORD {
		bytes.truncate(MAX_RECORD - 1);
		bytes.push(b'\n');
	}
	bytes
}

impl LogRecord {
	/// Parse one wire line. Returns `None` for anything that does not match
	/// the five-field form: unknown type codes, empty or oversized path/name,
	/// bracket leakage, empty message. Oversized messages are truncated.
	pub fn parse(line: &str) -> Option<LogRecord> {
		let line = line.strip_suffix('\n').unwrap_or(line);

		let rest = line.strip_prefix('[')?;
		let (ts, rest) = rest.split_once(']')?;
		let timestamp_ms: i64 = ts.parse().ok()?;

		let rest = rest.strip_prefix('[')?;
		let (code, rest) = rest.split_once(']')?;
		let rtype = RecordType::from_code(code.parse().ok()?)?;

		let rest = rest.strip_prefix('[')?;
		let (pid, rest) = rest.split_once(']')?;
		let pid: i32 = pid.parse().ok()?;

		let rest = rest.strip_prefix('[')?;
		let (path, rest) = rest.split_once(']')?;
		let rest = rest.strip_prefix('[')?;
		let (name, rest) = rest.split_once(']')?;

		if !field_ok(path) || !field_ok(name) {
			return None;
		}

		let message = rest.strip_prefix(':')?;
		if message.is_empty() || message.contains('\n') {
			return None;
		}

		Some(LogRecord {
			timestamp_ms,
			rtype,
			pid,
			path: path.to_string(),
			name: name.to_string(),
			message: truncate_bytes(message, MAX_MESSAGE).to_string(),
		})
	}

	/// Default rendering: the full wire line.
	pub fn render_default(&self) -> String {
		String::from_utf8_lossy(&render_wire(
			self.timestamp_ms,
			self.rtype,
			self.pid,
			&self.path,
			&self.name,
			&self.message,
		))
		.into_owned()
	}
}

fn field_ok(field: &str) -> bool {
	!field.is_empty() && field.len() <= MAX_FIELD && !field.contains('[')
}

/// Truncate to at most `max` bytes on a char boundary.
pub(crate) fn truncate_bytes(s: &str, max: usize) -> &str {
	if s.len() <= max {
		return s;
	}
	let mut end = max;
	while !s.is_char_boundary(end) {
		end -= 1;
	}
	&s[..end]
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS:microseconds`
/// (UTC).
pub fn human_time(timestamp_ms: i64) -> String {
	let secs = timestamp_ms.div_euclid(1000);
	let micros = timestamp_ms.rem_euclid(1000) * 1000;
	let (year, month, day, hour, minute, second) = secs_to_datetime(secs);
	format!(
		"{:04}-{:02}-{:02} {:02}:{:02}:{:02}:{:06}",
		year, month, day, hour, minute, second, micros
	)
}

// Civil-from-days conversion, days-based Gregorian arithmetic.
fn secs_to_datetime(secs: i64) -> (i64, u32, u32, u32, u32, u32) {
	let days = secs.div_euclid(86400);
	let time_of_day = secs.rem_euclid(86400);
	let hour = (time_of_day / 3600) as u32;
	let minute = ((time_of_day % 3600) / 60) as u32;
	let second = (time_of_day % 60) as u32;

	let z = days + 719468;
	let era = if z >= 0 { z } else { z - 146096 } / 146097;
	let doe = (z - era * 146097) as u32;
	let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	let y = yoe as i64 + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let d = doy - (153 * mp + 2) / 5 + 1;
	let m = if mp < 10 { mp + 3 } else { mp - 9 };
	let y = if m <= 2 { y + 1 } else { y };

	(y, m, d, hour, minute, second)
}
