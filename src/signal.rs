use crate::error::SysError;
use crate::shim::{self, SigAction};
use rustix::process::Signal;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Pid of the foreground job's process group, or 0 if the shell itself
/// is in the foreground. Updated only by the shell loop; read only by
/// the signal handlers below, so it must be an atomic rather than a
/// plain field.
static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);

/// Set by the SIGCHLD handler, drained by the shell loop.
static CHILD_PENDING: AtomicBool = AtomicBool::new(false);

/// Record which process group is currently in the foreground.
/// A pgid of 0 means no job currently owns the terminal.
pub fn set_foreground_pgid(pgid: i32) {
    FOREGROUND_PGID.store(pgid, Ordering::SeqCst);
}

pub fn foreground_pgid() -> i32 {
    FOREGROUND_PGID.load(Ordering::SeqCst)
}

/// Has a SIGCHLD arrived since the last `take_child_pending()`?
pub fn take_child_pending() -> bool {
    CHILD_PENDING.swap(false, Ordering::SeqCst)
}

/// Async-signal-safe: forwards SIGINT to the foreground job's process
/// group, mirroring ysh.c's sigint_handler.
extern "C" fn on_sigint(_sig: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGINT);
        }
    }
}

/// Async-signal-safe: forwards SIGTSTP to the foreground job's process
/// group, mirroring ysh.c's sigtstp_handler.
extern "C" fn on_sigtstp(_sig: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGTSTP);
        }
    }
}

/// Async-signal-safe: only raises a flag. Reaping and job-table mutation
/// happen later in the shell loop, with SIGCHLD blocked, per ysh.c's
/// sigchld_handler deferred to a safe context.
extern "C" fn on_sigchld(_sig: libc::c_int) {
    CHILD_PENDING.store(true, Ordering::SeqCst);
}

/// Restore default dispositions for the signals the shell cares about.
/// Called right after fork(), before the child becomes session leader,
/// so it doesn't inherit whatever the supervisor/bridge process had set.
pub fn reset_to_default() -> Result<(), SysError> {
    for sig in [Signal::INT, Signal::TSTP, Signal::CHILD, Signal::PIPE] {
        shim::sigaction(sig, SigAction::Default)
            .map_err(|err| SysError::Syscall("sigaction()", err))?;
    }
    shim::sigmask(
        &[Signal::INT, Signal::TSTP, Signal::CHILD],
        shim::SigMask::Unblock,
    )
    .map_err(|err| SysError::Syscall("sigmask()", err))?;
    Ok(())
}

/// Install the shell process's real signal handlers. Called once, right
/// after the shell child becomes session leader.
pub fn install_shell_handlers() -> Result<(), SysError> {
    shim::sigaction(Signal::INT, SigAction::Handler(on_sigint))
        .map_err(|err| SysError::Syscall("sigaction(SIGINT)", err))?;
    shim::sigaction(Signal::TSTP, SigAction::Handler(on_sigtstp))
        .map_err(|err| SysError::Syscall("sigaction(SIGTSTP)", err))?;
    shim::sigaction(Signal::CHILD, SigAction::Handler(on_sigchld))
        .map_err(|err| SysError::Syscall("sigaction(SIGCHLD)", err))?;
    Ok(())
}

/// Block SIGCHLD for the duration of a job-table mutation, matching the
/// design note that table mutation must run with the signal blocked.
pub fn block_sigchld<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _ = shim::sigmask(&[Signal::CHILD], shim::SigMask::Block);
    let result = f();
    let _ = shim::sigmask(&[Signal::CHILD], shim::SigMask::Unblock);
    result
}
