use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use nix::sys::signal::{kill, Signal};
use tokio::net::unix::pipe;

use camstream::session::CaptureSession;
use camstream::stream::{stream_loop, StillImage};
use camstream::watcher::watch_worker;
use camstream::worker::spawn_worker;

#[derive(Parser)]
#[command(name = "camstream", version, about = "Pipe camera frames to a supervised ffmpeg HLS worker")]
struct Cli {
	/// Frame size handed to the encoder, as WxH
	#[arg(short, long, default_value = "1366x768")]
	resolution: String,
	/// Input framerate in frames per second
	#[arg(short, long, default_value = "10")]
	framerate: String,
	/// JPEG file used as the frame source
	#[arg(short, long)]
	image: PathBuf,
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt().init();
	let cli = Cli::parse();

	// The supervisor pastes these into the encoder invocation as-is, so
	// sanity-check them here.
	let fps: u32 = match cli.framerate.parse() {
		Ok(n) if n > 0 => n,
		_ => {
			eprintln!("invalid framerate: {}", cli.framerate);
			exit(2);
		}
	};
	if !valid_resolution(&cli.resolution) {
		eprintln!("invalid resolution (expected WxH): {}", cli.resolution);
		exit(2);
	}

	let (tx, rx) = match pipe::pipe() {
		Ok(p) => p,
		Err(e) => {
			tracing::error!("failed to create frame pipe: {}", e);
			exit(1);
		}
	};
	// The worker inherits the read end as plain blocking stdin.
	let stdin_fd = match rx.into_blocking_fd() {
		Ok(fd) => fd,
		Err(e) => {
			tracing::error!("failed to prepare worker stdin: {}", e);
			exit(1);
		}
	};

	let handle = match spawn_worker(stdin_fd, &cli.resolution, &cli.framerate) {
		Ok(h) => h,
		Err(e) => {
			tracing::error!("failed to start worker: {}", e);
			exit(1);
		}
	};
	let worker_pid = handle.pid();
	tracing::info!("worker started (pid {})", worker_pid);

	let session = Arc::new(CaptureSession::new());
	tokio::spawn(watch_worker(handle, Arc::clone(&session)));

	let mut source = StillImage::new(cli.image);
	tokio::select! {
		r = stream_loop(&mut source, tx, &session, fps) => {
			if let Err(e) = r {
				tracing::error!("failure in transmission of frames to worker: {}", e);
				exit(1);
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutting down");
			let _ = kill(worker_pid, Signal::SIGTERM);
		}
	}
}

fn valid_resolution(res: &str) -> bool {
	match res.split_once('x') {
		Some((w, h)) => w.parse::<u32>().is_ok() && h.parse::<u32>().is_ok(),
		None => false,
	}
}
