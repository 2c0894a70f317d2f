use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use selog::{LogFilter, LogQuery, LogStore};
use seproc::{run_and_capture, spawn_captured, SpawnError};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

fn test_store(name: &str) -> (LogStore, LogQuery, std::path::PathBuf) {
	let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	let dir = std::env::temp_dir().join(format!("seproc-test-{}-{}", n, name));
	let _ = std::fs::create_dir_all(&dir);
	let active = dir.join("se.log");
	let backup = dir.join("se_last.log");
	(
		LogStore::new(&active, &backup),
		LogQuery::new(&active, &backup),
		dir,
	)
}

fn read_lines(query: &LogQuery) -> Vec<String> {
	let out = query.read(&LogFilter::default(), 256 * 1024).unwrap();
	out.text.lines().map(|l| l.to_string()).collect()
}

fn argv(parts: &[&str]) -> Vec<String> {
	parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn echo_produces_full_log_trail() {
	let (store, query, dir) = test_store("echo");

	let pid = run_and_capture(&store, &argv(&["/bin/echo", "hello-seproc"]))
		.await
		.unwrap();
	assert!(pid > 0);

	let lines = read_lines(&query);
	assert_eq!(lines.len(), 3, "lines: {:?}", lines);
	assert!(lines[0].ends_with("[/bin/echo][echo]:start!"));
	assert!(lines[1].ends_with("[/bin/echo][echo]:hello-seproc"));
	assert!(lines[2].ends_with("[/bin/echo][echo]:exit!"));
	// All three records carry the child's pid.
	for line in &lines {
		assert!(line.contains(&format!("[{}]", pid)), "line: {}", line);
	}

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn spawn_failure_is_logged_and_returned() {
	let (store, query, dir) = test_store("spawn-fail");

	let result = run_and_capture(&store, &argv(&["/nonexistent/seproc-binary"])).await;
	assert!(matches!(result, Err(SpawnError::Io(_))));

	let lines = read_lines(&query);
	assert_eq!(lines.len(), 1);
	// The OS error is logged under the supervisor's own pid.
	let me = format!("[{}]", std::process::id());
	assert!(lines[0].contains(&me), "line: {}", lines[0]);
	assert!(lines[0].contains("seproc-binary]:"), "line: {}", lines[0]);

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn empty_command_is_rejected() {
	let (store, _, dir) = test_store("empty");
	let result = run_and_capture(&store, &[]).await;
	assert!(matches!(result, Err(SpawnError::EmptyCommand)));
	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn carriage_returns_and_fragments_are_normalized() {
	let (store, query, dir) = test_store("lines");

	run_and_capture(&store, &argv(&["/bin/sh", "-c", r#"printf 'a\r\nb\nc'"#]))
		.await
		.unwrap();

	let lines = read_lines(&query);
	// start!, "a " (\r became a space), "b", "c" (EOF fragment), exit!
	assert_eq!(lines.len(), 5, "lines: {:?}", lines);
	assert!(lines[1].ends_with(":a "), "line: {}", lines[1]);
	assert!(lines[2].ends_with(":b"), "line: {}", lines[2]);
	assert!(lines[3].ends_with(":c"), "line: {}", lines[3]);

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn blank_output_lines_are_dropped() {
	let (store, query, dir) = test_store("blank");

	run_and_capture(&store, &argv(&["/bin/sh", "-c", r#"printf 'x\n\n\ny\n'"#]))
		.await
		.unwrap();

	let lines = read_lines(&query);
	assert_eq!(lines.len(), 4, "lines: {:?}", lines); // start!, x, y, exit!
	assert!(lines[1].ends_with(":x"));
	assert!(lines[2].ends_with(":y"));

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn stderr_is_captured_too() {
	let (store, query, dir) = test_store("stderr");

	run_and_capture(&store, &argv(&["/bin/sh", "-c", "echo oops 1>&2"]))
		.await
		.unwrap();

	let lines = read_lines(&query);
	assert!(lines.iter().any(|l| l.ends_with(":oops")), "lines: {:?}", lines);

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn nonzero_exit_still_logs_exit() {
	let (store, query, dir) = test_store("nonzero");

	let result = run_and_capture(&store, &argv(&["/bin/sh", "-c", "exit 3"])).await;
	assert!(result.is_ok(), "child failure is not a supervisor error");

	let lines = read_lines(&query);
	assert!(lines.last().unwrap().ends_with(":exit!"));

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn wait_timeout_leaves_child_running() {
	let (store, query, dir) = test_store("timeout");

	let mut child = spawn_captured(&store, &argv(&["/bin/sleep", "5"]))
		.await
		.unwrap();
	let start = std::time::Instant::now();
	let done = child.wait_timeout(Duration::from_millis(200)).await;
	assert!(!done);
	assert!(start.elapsed() < Duration::from_secs(2));

	// No exit! record yet; the child is still alive.
	let lines = read_lines(&query);
	assert_eq!(lines.len(), 1);
	assert!(lines[0].ends_with(":start!"));
	assert!(seproc::process_alive(child.pid));

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn wait_timeout_reports_fast_exit() {
	let (store, _, dir) = test_store("fast");

	let mut child = spawn_captured(&store, &argv(&["/bin/echo", "quick"]))
		.await
		.unwrap();
	assert!(child.wait_timeout(Duration::from_secs(10)).await);

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn newline_free_stream_emits_one_capped_record() {
	let (store, query, dir) = test_store("no-newline");

	// Several MiB without a single newline; only the first capped chunk of
	// the line is kept, the rest is discarded as it streams.
	run_and_capture(
		&store,
		&argv(&["/bin/sh", "-c", "head -c 3000000 /dev/zero | tr '\\000' w"]),
	)
	.await
	.unwrap();

	let lines = read_lines(&query);
	assert_eq!(lines.len(), 3, "lines: {:?}", lines); // start!, one record, exit!
	let msg = lines[1].split_once("]:").unwrap().1;
	assert_eq!(msg.len(), selog::MAX_MESSAGE);
	assert!(msg.bytes().all(|b| b == b'w'));

	let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn long_output_lines_are_capped() {
	let (store, query, dir) = test_store("long-line");

	run_and_capture(
		&store,
		&argv(&["/bin/sh", "-c", "printf 'z%.0s' $(seq 1 3000); echo"]),
	)
	.await
	.unwrap();

	let lines = read_lines(&query);
	let long = lines.iter().find(|l| l.contains(":zzz")).unwrap();
	let msg = long.split_once("]:").unwrap().1;
	assert_eq!(msg.len(), selog::MAX_MESSAGE, "line: {}", long);

	let _ = std::fs::remove_dir_all(&dir);
}
