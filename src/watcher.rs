use std::os::fd::AsFd;
use std::sync::Arc;

use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

use crate::session::CaptureSession;
use crate::worker::WorkerHandle;

/// Outcome of one readiness callback on the worker's pidfd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCheck {
	/// The wait itself failed; transient observation error, no state change.
	Transient,
	/// Readable but nothing to reap; spurious wakeup, no state change.
	Spurious,
	/// Exit or signal status reaped; the session has been failed.
	Fatal,
}

/// Readiness callback for the worker pidfd.
///
/// Non-blocking wait, then classify. Any reaped status is fatal regardless
/// of the exit code or signal: the worker is supposed to outlive the
/// capture session, and frame sequencing cannot resume mid-stream, so a
/// clean exit is just as terminal as a crash.
pub fn check_worker(handle: &WorkerHandle, session: &CaptureSession) -> ExitCheck {
	match waitid(
		Id::PIDFd(handle.as_fd()),
		WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG,
	) {
		Err(e) => {
			tracing::error!("failed to wait on worker {}: {}", handle.pid(), e);
			ExitCheck::Transient
		}
		Ok(WaitStatus::StillAlive) => {
			tracing::warn!(
				"pidfd for worker {} readable but nothing to reap, ignoring",
				handle.pid()
			);
			ExitCheck::Spurious
		}
		Ok(status) => {
			tracing::error!("worker {} died ({:?}), fatal", handle.pid(), status);
			session.fail();
			ExitCheck::Fatal
		}
	}
}

/// Own the handle, register its pidfd with the I/O driver and run
/// [`check_worker`] once per readiness edge until the worker is reaped.
///
/// Spawn this only after a successful [`spawn_worker`](crate::spawn_worker);
/// exactly one watcher per handle.
pub async fn watch_worker(handle: WorkerHandle, session: Arc<CaptureSession>) {
	let fd = match AsyncFd::with_interest(handle, Interest::READABLE) {
		Ok(fd) => fd,
		Err(e) => {
			tracing::error!("failed to register worker pidfd: {}", e);
			session.fail();
			return;
		}
	};

	loop {
		let mut guard = match fd.readable().await {
			Ok(g) => g,
			Err(e) => {
				tracing::error!("failed to poll worker pidfd: {}", e);
				session.fail();
				return;
			}
		};
		match check_worker(fd.get_ref(), &session) {
			ExitCheck::Fatal => return,
			ExitCheck::Transient | ExitCheck::Spurious => guard.clear_ready(),
		}
	}
}
