use std::io::Write;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use camstream::pidfd;
use camstream::session::{CamState, CaptureSession};
use camstream::stream::{stream_loop, FrameSource, StillImage};
use camstream::watcher::{check_worker, watch_worker, ExitCheck};
use camstream::worker::{encoder_args, spawn_supervised, WorkerError, WorkerHandle};

fn sleeper(secs: u32) -> Command {
	let mut cmd = Command::new("sleep");
	cmd.arg(secs.to_string());
	cmd
}

/// Poll the readiness callback until it reaps something, or give up.
async fn poll_until_fatal(handle: &WorkerHandle, session: &CaptureSession) -> ExitCheck {
	let mut outcome = ExitCheck::Spurious;
	for _ in 0..50 {
		outcome = check_worker(handle, session);
		if outcome == ExitCheck::Fatal {
			break;
		}
		tokio::time::sleep(Duration::from_millis(100)).await;
	}
	outcome
}

// --- Encoder invocation (external contract) ---

#[test]
fn encoder_args_carry_resolution_and_framerate() {
	let args = encoder_args("1366x768", "10");
	let joined = args.join(" ");
	assert!(joined.contains("-framerate 10"), "args were: {}", joined);
	assert!(joined.contains("-s 1366x768"), "args were: {}", joined);
	assert!(joined.contains("-f image2pipe"));
	assert!(joined.contains("-an"));
}

#[test]
fn encoder_args_segment_window() {
	let args = encoder_args("640x480", "25");
	let joined = args.join(" ");
	assert!(joined.contains("-hls_time 1"));
	assert!(joined.contains("-hls_list_size 10"));
	assert!(joined.contains("-hls_flags delete_segments"));
	assert!(args.contains(&"hls/capture%05d.ts".to_string()));
	assert_eq!(args.last().unwrap(), "hls/index.m3u8");
}

// --- Session state machine ---

#[test]
fn session_starts_running() {
	let session = CaptureSession::new();
	assert_eq!(session.state(), CamState::Running);
}

#[test]
fn session_fail_is_idempotent() {
	let session = CaptureSession::new();
	session.fail();
	session.fail();
	assert_eq!(session.state(), CamState::Failed);
}

#[tokio::test]
async fn session_fail_notifies_subscribers() {
	let session = CaptureSession::new();
	let mut rx = session.subscribe();
	session.fail();
	rx.changed().await.unwrap();
	assert_eq!(*rx.borrow(), CamState::Failed);
}

// --- Supervisor: spawn + pidfd + probe ---

#[tokio::test]
async fn spawned_worker_is_alive() {
	let handle = spawn_supervised(sleeper(30)).unwrap();
	assert!(handle.probe().is_ok());
	assert!(handle.pid().as_raw() > 0);
	let _ = handle.kill();
}

#[tokio::test]
async fn spawn_missing_binary_fails() {
	let err = spawn_supervised(Command::new("/nonexistent/not-a-worker")).unwrap_err();
	assert!(matches!(err, WorkerError::SpawnFailed(_)), "got: {}", err);
}

#[tokio::test]
async fn pidfd_open_after_reap_fails() {
	// Reap the child first so the pid no longer names a waitable process.
	let mut child = Command::new("true").spawn().unwrap();
	let pid = Pid::from_raw(child.id() as i32);
	child.wait().unwrap();
	assert!(pidfd::open(pid).is_err());
}

// --- Exit watcher callback ---

#[tokio::test]
async fn check_on_live_worker_is_spurious() {
	let handle = spawn_supervised(sleeper(30)).unwrap();
	let session = CaptureSession::new();
	assert_eq!(check_worker(&handle, &session), ExitCheck::Spurious);
	assert_eq!(session.state(), CamState::Running);
	let _ = handle.kill();
}

#[tokio::test]
async fn killed_worker_fails_session_exactly_once() {
	let handle = spawn_supervised(sleeper(30)).unwrap();
	let session = CaptureSession::new();
	handle.kill().unwrap();

	assert_eq!(poll_until_fatal(&handle, &session).await, ExitCheck::Fatal);
	assert_eq!(session.state(), CamState::Failed);

	// Already reaped: a second callback has nothing to observe and must
	// not report fatal again.
	assert_ne!(check_worker(&handle, &session), ExitCheck::Fatal);
	assert_eq!(session.state(), CamState::Failed);
}

#[tokio::test]
async fn clean_exit_is_fatal_too() {
	let handle = spawn_supervised(Command::new("true")).unwrap();
	let session = CaptureSession::new();
	assert_eq!(poll_until_fatal(&handle, &session).await, ExitCheck::Fatal);
	assert_eq!(session.state(), CamState::Failed);
}

#[tokio::test]
async fn nonzero_exit_is_fatal() {
	let mut cmd = Command::new("sh");
	cmd.args(["-c", "exit 1"]);
	let handle = spawn_supervised(cmd).unwrap();
	let session = CaptureSession::new();
	assert_eq!(poll_until_fatal(&handle, &session).await, ExitCheck::Fatal);
	assert_eq!(session.state(), CamState::Failed);
}

// --- Watcher task on the I/O driver ---

#[tokio::test]
async fn watcher_observes_external_kill() {
	let handle = spawn_supervised(sleeper(30)).unwrap();
	let pid = handle.pid();
	let session = Arc::new(CaptureSession::new());
	let mut state = session.subscribe();
	tokio::spawn(watch_worker(handle, Arc::clone(&session)));

	nix::sys::signal::kill(pid, Signal::SIGKILL).unwrap();

	tokio::time::timeout(Duration::from_secs(5), async {
		while *state.borrow_and_update() != CamState::Failed {
			state.changed().await.unwrap();
		}
	})
	.await
	.expect("watcher did not observe worker death");
	assert_eq!(session.state(), CamState::Failed);
}

// --- Frame streaming ---

#[test]
fn still_image_rereads_file() {
	let path = std::env::temp_dir().join("camstream-test-frame.jpg");
	std::fs::File::create(&path)
		.unwrap()
		.write_all(b"not really a jpeg")
		.unwrap();

	let mut source = StillImage::new(&path);
	assert_eq!(source.next_frame().unwrap(), b"not really a jpeg");
	assert_eq!(source.next_frame().unwrap(), b"not really a jpeg");

	let _ = std::fs::remove_file(&path);
}

struct StaticFrames;

impl FrameSource for StaticFrames {
	fn next_frame(&mut self) -> std::io::Result<Vec<u8>> {
		Ok(vec![0u8; 16])
	}
}

#[tokio::test]
async fn stream_loop_stops_on_failed_session() {
	let (tx, rx) = tokio::net::unix::pipe::pipe().unwrap();
	let session = CaptureSession::new();
	session.fail();

	let mut source = StaticFrames;
	let r = tokio::time::timeout(
		Duration::from_secs(5),
		stream_loop(&mut source, tx, &session, 100),
	)
	.await
	.expect("stream loop did not notice the failed session");
	assert!(r.is_err());
	drop(rx);
}

#[tokio::test]
async fn stream_loop_rejects_zero_framerate() {
	let (tx, _rx) = tokio::net::unix::pipe::pipe().unwrap();
	let session = CaptureSession::new();
	let mut source = StaticFrames;
	let err = stream_loop(&mut source, tx, &session, 0).await.unwrap_err();
	assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[tokio::test]
async fn stream_loop_stops_on_broken_pipe() {
	let (tx, rx) = tokio::net::unix::pipe::pipe().unwrap();
	drop(rx);

	let session = CaptureSession::new();
	let mut source = StaticFrames;
	let r = tokio::time::timeout(
		Duration::from_secs(5),
		stream_loop(&mut source, tx, &session, 100),
	)
	.await
	.expect("stream loop did not notice the broken pipe");
	assert!(r.is_err());
}
