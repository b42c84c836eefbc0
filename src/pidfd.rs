//! Thin wrappers around the pidfd syscalls.
//!
//! `nix` has no bindings for `pidfd_open(2)` / `pidfd_send_signal(2)`, so
//! these go through `libc::syscall` directly. A pidfd refers to one specific
//! process instance and stays valid across pid reuse.

use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// Open a process descriptor for `pid`.
///
/// Fails with the raw errno on any OS-level rejection, e.g. when the
/// process has already been reaped.
pub fn open(pid: Pid) -> Result<OwnedFd, Errno> {
	let fd = unsafe { libc::syscall(libc::SYS_pidfd_open, pid.as_raw(), 0u32) };
	Errno::result(fd).map(|fd| unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
}

/// Deliver `signal` to the process behind `fd`.
///
/// As with [`nix::sys::signal::kill`], `None` sends the null signal: nothing
/// is delivered, but success means the process exists and is signalable.
/// The descriptor itself is left untouched.
pub fn send_signal<T: Into<Option<Signal>>>(fd: BorrowedFd<'_>, signal: T) -> Result<(), Errno> {
	let sig = signal.into().map(|s| s as libc::c_int).unwrap_or(0);
	let r = unsafe {
		libc::syscall(
			libc::SYS_pidfd_send_signal,
			fd.as_raw_fd(),
			sig,
			std::ptr::null::<libc::siginfo_t>(),
			0u32,
		)
	};
	Errno::result(r).map(drop)
}
