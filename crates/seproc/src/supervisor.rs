use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::stat::{umask, Mode};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;

use selog::{LogStore, RecordType, MAX_MESSAGE};

const READ_CHUNK: usize = 1024;

#[derive(Debug)]
pub enum SpawnError {
	/// No command was given.
	EmptyCommand,
	/// Detaching from the terminal failed; the command was never run.
	Daemonize(nix::Error),
	/// Spawning the child or building the runtime failed.
	Io(io::Error),
}

impl std::fmt::Display for SpawnError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SpawnError::EmptyCommand => write!(f, "empty command"),
			SpawnError::Daemonize(e) => write!(f, "daemonize failed!: {}", e),
			SpawnError::Io(e) => write!(f, "spawn failed: {}", e),
		}
	}
}

impl std::error::Error for SpawnError {}

impl From<io::Error> for SpawnError {
	fn from(e: io::Error) -> Self {
		SpawnError::Io(e)
	}
}

/// A spawned, logged child. Owns the child's stdin pipe (held open, unused
/// for data) and the waiter task that drains output, reaps the child, and
/// writes the `exit!` record.
pub struct RunningChild {
	pub pid: i32,
	waiter: JoinHandle<()>,
}

impl RunningChild {
	/// Block until the child has exited and its log trail is complete.
	pub async fn wait(self) {
		let _ = self.waiter.await;
	}

	/// Wait for completion with a deadline. Returns `false` when the
	/// deadline elapses first; the child keeps running untouched and can be
	/// reaped later with [`RunningChild::wait`].
	pub async fn wait_timeout(&mut self, dur: Duration) -> bool {
		tokio::time::timeout(dur, &mut self.waiter).await.is_ok()
	}
}

/// Spawn `argv` as a monitored subprocess: stdio wired through pipes,
/// combined stdout/stderr streamed into the store one Process record per
/// non-empty line, `start!`/`exit!` lifecycle records around it.
///
/// The umask is cleared before the spawn and inherited descriptors are not
/// leaked into the child (the runtime spawns with close-on-exec). Exit
/// status is awaited but only the log trail records the lifecycle.
pub async fn spawn_captured(store: &LogStore, argv: &[String]) -> Result<RunningChild, SpawnError> {
	let path = argv.first().ok_or(SpawnError::EmptyCommand)?.clone();
	let name = base_name(&path);

	umask(Mode::empty());

	let mut child = match Command::new(&path)
		.args(&argv[1..])
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
	{
		Ok(c) => c,
		Err(e) => {
			log_or_warn(store, std::process::id() as i32, &path, &name, &e.to_string());
			return Err(SpawnError::Io(e));
		}
	};

	let pid = child.id().map(|p| p as i32).unwrap_or(0);
	log_or_warn(store, pid, &path, &name, "start!");

	let stdin = child.stdin.take();
	let out_task = child
		.stdout
		.take()
		.map(|r| tokio::spawn(pipe_lines(r, store.clone(), pid, path.clone(), name.clone())));
	let err_task = child
		.stderr
		.take()
		.map(|r| tokio::spawn(pipe_lines(r, store.clone(), pid, path.clone(), name.clone())));

	let store = store.clone();
	let waiter = tokio::spawn(async move {
		if let Some(t) = out_task {
			let _ = t.await;
		}
		if let Some(t) = err_task {
			let _ = t.await;
		}
		let _ = child.wait().await;
		// The stdin pipe stayed open for the child's whole lifetime.
		drop(stdin);
		log_or_warn(&store, pid, &path, &name, "exit!");
	});

	Ok(RunningChild { pid, waiter })
}

/// Spawn and block until exit. Returns the child's pid; its exit status is
/// observable only through the log trail.
pub async fn run_and_capture(store: &LogStore, argv: &[String]) -> Result<i32, SpawnError> {
	let child = spawn_captured(store, argv).await?;
	let pid = child.pid;
	child.wait().await;
	Ok(pid)
}

/// Daemonize, then run `argv` supervised until it exits. The entry point
/// for `seboot <command>`; must be called outside any async runtime.
///
/// A daemonize failure is logged as a Process record and the command is
/// never attempted.
pub fn spawn_daemon(store: &LogStore, argv: &[String]) -> Result<i32, SpawnError> {
	let path = argv.first().ok_or(SpawnError::EmptyCommand)?;
	let name = base_name(path);

	if let Err(e) = crate::daemon::daemonize() {
		let err = SpawnError::Daemonize(e);
		log_or_warn(store, std::process::id() as i32, path, &name, &err.to_string());
		return Err(err);
	}

	let rt = tokio::runtime::Runtime::new()?;
	rt.block_on(run_and_capture(store, argv))
}

/// Stream one pipe into the store, one record per line. Carriage returns
/// are normalized to spaces, a line spanning read chunks is reassembled
/// from its carried fragment, and the trailing fragment at end-of-stream is
/// flushed as its own record.
///
/// A line that reaches the message cap is emitted once at the cap and the
/// rest of it is discarded, so the carry buffer never grows past the cap
/// even on a newline-free stream.
async fn pipe_lines<R: tokio::io::AsyncRead + Unpin>(
	mut reader: R,
	store: LogStore,
	pid: i32,
	path: String,
	name: String,
) {
	let mut buf = [0u8; READ_CHUNK];
	let mut pending: Vec<u8> = Vec::new();
	let mut discarding = false;

	loop {
		match reader.read(&mut buf).await {
			Ok(0) => break,
			Ok(n) => {
				for &b in &buf[..n] {
					let b = if b == b'\r' { b' ' } else { b };
					if b == b'\n' {
						if !discarding {
							emit_line(&store, pid, &path, &name, &pending);
						}
						pending.clear();
						discarding = false;
					} else if !discarding {
						pending.push(b);
						if pending.len() >= MAX_MESSAGE {
							emit_line(&store, pid, &path, &name, &pending);
							pending.clear();
							discarding = true;
						}
					}
				}
			}
			Err(_) => break,
		}
	}

	if !discarding {
		emit_line(&store, pid, &path, &name, &pending);
	}
}

fn emit_line(store: &LogStore, pid: i32, path: &str, name: &str, bytes: &[u8]) {
	if bytes.is_empty() {
		return;
	}
	let end = bytes.len().min(MAX_MESSAGE);
	let line = String::from_utf8_lossy(&bytes[..end]);
	log_or_warn(store, pid, path, name, &line);
}

fn log_or_warn(store: &LogStore, pid: i32, path: &str, name: &str, message: &str) {
	if let Err(e) = store.append(RecordType::Process, pid, path, name, message) {
		tracing::warn!("log append failed: {}", e);
	}
}

fn base_name(path: &str) -> String {
	Path::new(path)
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
	use super::base_name;

	#[test]
	fn base_name_of_paths() {
		assert_eq!(base_name("/bin/sh"), "sh");
		assert_eq!(base_name("sh"), "sh");
		assert_eq!(base_name("/usr/local/bin/my-tool"), "my-tool");
	}
}
