use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;

use crate::session::{CamState, CaptureSession};

/// Source of encoded frames for the worker. Camera drivers live behind
/// this seam; the rest of the pipeline only ever sees bytes.
pub trait FrameSource {
	fn next_frame(&mut self) -> io::Result<Vec<u8>>;
}

/// Re-reads a single JPEG from disk for every frame. Stand-in source for
/// running without camera hardware.
pub struct StillImage {
	path: PathBuf,
}

impl StillImage {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl FrameSource for StillImage {
	fn next_frame(&mut self) -> io::Result<Vec<u8>> {
		std::fs::read(&self.path)
	}
}

/// Pump frames into the worker's stdin pipe at `fps` until the session
/// fails, a capture fails, or the pipe breaks (worker gone).
/// `fps` must be nonzero; zero is rejected as `InvalidInput`.
pub async fn stream_loop<S: FrameSource>(
	source: &mut S,
	mut sink: pipe::Sender,
	session: &CaptureSession,
	fps: u32,
) -> io::Result<()> {
	if fps == 0 {
		return Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			"framerate must be nonzero",
		));
	}

	let mut state = session.subscribe();
	let mut ticker = tokio::time::interval(Duration::from_secs(1) / fps);

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				let frame = source.next_frame()?;
				sink.write_all(&frame).await?;
			}
			_ = state.wait_for(|s| *s == CamState::Failed) => {
				return Err(io::Error::new(io::ErrorKind::BrokenPipe, "worker failed"));
			}
		}
	}
}
