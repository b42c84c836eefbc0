use std::fmt;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::pidfd;

/// Fixed path of the encoder binary. The whole invocation is an external
/// contract, not configuration.
const FFMPEG: &str = "/usr/bin/ffmpeg";
/// Relative directory segments and the playlist are written under.
const HLS_DIR: &str = "hls";

/// Errors from spawning and verifying a worker.
#[derive(Debug)]
pub enum WorkerError {
	/// The encoder process could not be created.
	SpawnFailed(io::Error),
	/// No pidfd could be opened for the spawned process.
	OpenFailed(Errno),
	/// The post-spawn liveness probe failed.
	DeliveryFailed(Errno),
}

impl fmt::Display for WorkerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WorkerError::SpawnFailed(e) => write!(f, "failed to spawn worker: {}", e),
			WorkerError::OpenFailed(e) => write!(f, "failed to open pidfd: {}", e),
			WorkerError::DeliveryFailed(e) => write!(f, "failed to signal worker: {}", e),
		}
	}
}

impl std::error::Error for WorkerError {}

/// A supervised encoder process: its pid plus the pidfd referring to
/// exactly this instance of it.
///
/// The handle is the sole owner of the descriptor; dropping it closes the
/// kernel reference. One handle pairs with at most one exit watcher.
#[derive(Debug)]
pub struct WorkerHandle {
	pid: Pid,
	pidfd: OwnedFd,
}

impl WorkerHandle {
	pub fn pid(&self) -> Pid {
		self.pid
	}

	/// Null-signal liveness probe: succeeds iff the worker still exists.
	pub fn probe(&self) -> Result<(), Errno> {
		pidfd::send_signal(self.pidfd.as_fd(), None)
	}

	/// Kill the worker through the pidfd. Asynchronous: the actual exit is
	/// observed by the watcher, not here.
	pub fn kill(&self) -> Result<(), Errno> {
		pidfd::send_signal(self.pidfd.as_fd(), Signal::SIGKILL)
	}
}

impl AsFd for WorkerHandle {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.pidfd.as_fd()
	}
}

impl AsRawFd for WorkerHandle {
	fn as_raw_fd(&self) -> RawFd {
		self.pidfd.as_raw_fd()
	}
}

/// Spawn the ffmpeg worker reading piped frames from `stdin`.
///
/// `resolution` (`WxH`) and `framerate` are validated by the caller and
/// pasted into the argument vector as-is. The environment is cleared; the
/// worker needs nothing from ours.
pub fn spawn_worker(
	stdin: OwnedFd,
	resolution: &str,
	framerate: &str,
) -> Result<WorkerHandle, WorkerError> {
	// May pre-exist, in which case this is a no-op.
	if let Err(e) = std::fs::create_dir_all(HLS_DIR) {
		tracing::warn!("failed to create directory {}, ignoring: {}", HLS_DIR, e);
	}

	let mut cmd = Command::new(FFMPEG);
	cmd.args(encoder_args(resolution, framerate))
		.env_clear()
		.stdin(Stdio::from(stdin));
	spawn_supervised(cmd)
}

/// Spawn an arbitrary command under pidfd supervision: create the child,
/// open a pidfd for it, and verify it is alive before handing it out.
///
/// The child is not `wait`ed here; the exit watcher reaps it through the
/// pidfd.
pub fn spawn_supervised(mut cmd: Command) -> Result<WorkerHandle, WorkerError> {
	let child = cmd.spawn().map_err(WorkerError::SpawnFailed)?;
	supervise(child, pidfd::open)
}

fn supervise(
	child: Child,
	opener: impl Fn(Pid) -> Result<OwnedFd, Errno>,
) -> Result<WorkerHandle, WorkerError> {
	let pid = Pid::from_raw(child.id() as i32);

	let pidfd = match opener(pid) {
		Ok(fd) => fd,
		Err(e) => {
			tracing::error!("failed to open pidfd for worker {}: {}", pid, e);
			tracing::info!("trying to clean up worker {}", pid);
			// The child may already be gone; signal by pid, and let a
			// failure here stand without masking the open error.
			let _ = kill(pid, Signal::SIGKILL);
			return Err(WorkerError::OpenFailed(e));
		}
	};

	let handle = WorkerHandle { pid, pidfd };
	if let Err(e) = handle.probe() {
		tracing::error!("worker {} is not alive: {}", pid, e);
		return Err(WorkerError::DeliveryFailed(e));
	}
	Ok(handle)
}

/// The fixed encoder invocation: piped image sequence on stdin, no audio,
/// libx264/yuv420p, HLS output with 1-second segments and a rolling window
/// of 10 (segments that age out are deleted).
pub fn encoder_args(resolution: &str, framerate: &str) -> Vec<String> {
	[
		"-f", "image2pipe",
		"-framerate", framerate,
		"-i", "/dev/stdin",
		"-an",
		"-s", resolution,
		"-c:v", "libx264",
		"-pix_fmt", "yuv420p",
		"-hls_time", "1",
		"-hls_list_size", "10",
		"-hls_segment_filename", "hls/capture%05d.ts",
		"-hls_flags", "delete_segments",
		"hls/index.m3u8",
	]
	.iter()
	.map(|s| s.to_string())
	.collect()
}
