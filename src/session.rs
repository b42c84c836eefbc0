use tokio::sync::watch;

/// Capture session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamState {
	Running,
	Failed,
}

/// Shared state of one capture session.
///
/// Holds a watch channel seeded `Running`. The exit watcher flips it to
/// `Failed`; the stream loop and anything else interested subscribe.
pub struct CaptureSession {
	state: watch::Sender<CamState>,
}

impl CaptureSession {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(CamState::Running);
		Self { state: tx }
	}

	pub fn state(&self) -> CamState {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<CamState> {
		self.state.subscribe()
	}

	/// Mark the session failed. Idempotent, and there is no transition back
	/// out of `Failed`. Safe to call from an event-loop callback.
	pub fn fail(&self) {
		self.state.send_if_modified(|s| {
			if *s == CamState::Failed {
				false
			} else {
				*s = CamState::Failed;
				true
			}
		});
	}
}

impl Default for CaptureSession {
	fn default() -> Self {
		Self::new()
	}
}
