//! # camstream
//!
//! Pipe camera frames into a supervised ffmpeg worker producing HLS output.
//!
//! The interesting part is the supervisor: the worker is spawned with its
//! stdin wired to a frame pipe, tracked through a pidfd, and watched for
//! exit by a non-blocking reaper on the async I/O driver. Any worker death,
//! clean or not, fails the capture session; recovery belongs to the caller.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use camstream::{spawn_worker, watch_worker, CaptureSession};
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! let (tx, rx) = tokio::net::unix::pipe::pipe()?;
//! let handle = spawn_worker(rx.into_blocking_fd()?, "1366x768", "10").unwrap();
//!
//! let session = Arc::new(CaptureSession::new());
//! tokio::spawn(watch_worker(handle, Arc::clone(&session)));
//! // write frames into `tx` until the session fails...
//! # Ok(())
//! # }
//! ```

pub mod pidfd;
pub mod session;
pub mod stream;
pub mod watcher;
pub mod worker;

pub use session::{CamState, CaptureSession};
pub use stream::{stream_loop, FrameSource, StillImage};
pub use watcher::{check_worker, watch_worker, ExitCheck};
pub use worker::{spawn_supervised, spawn_worker, WorkerError, WorkerHandle};
