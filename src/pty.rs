use crate::error::SysError;
use crate::shell::ShellState;
use crate::shim::{self, Fork};
use crate::signal;
use crate::status::*;
use crate::term::{self, TtyMode};
use rustix::fs::{self, Mode, OFlags};
use rustix::io::{self, Errno, retry_on_intr};
use rustix::process::{self, Pid, Signal, WaitOptions, WaitStatus};
use rustix::pty::{self, OpenptFlags};
use rustix::stdio;
use std::os::fd::{AsFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::Mutex;
use sysconf::raw::{SysconfVariable, sysconf};

/// Allocates a PTY pair and forks the shell child onto its slave side.
/// Keeps the slave fd open in the parent too, so pending output can
/// still be read after the child exits without triggering EIO.
pub struct PtyProc {
    master_fd: OwnedFd,
    slave_fd: OwnedFd,
    child: Mutex<Child>,
}

struct Child {
    pid: Option<Pid>,
    last_status: Option<WaitStatus>,
    final_status: Option<WaitStatus>,
}

/// Wait mode.
#[derive(PartialEq)]
pub enum PtyWait {
    Hang,
    NoHang,
}

impl PtyProc {
    /// Open master/slave pair.
    pub fn open() -> Result<Self, SysError> {
        let master_fd = match retry_on_intr(|| pty::openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY))
        {
            Ok(fd) => fd,
            Err(err) => return Err(SysError::Syscall("openpt()", err)),
        };

        if let Err(err) = retry_on_intr(|| pty::grantpt(&master_fd)) {
            return Err(SysError::Syscall("grantpt()", err));
        }
        if let Err(err) = retry_on_intr(|| pty::unlockpt(&master_fd)) {
            return Err(SysError::Syscall("unlockpt()", err));
        }

        let pts_name = match shim::ptsname(master_fd.as_fd()) {
            Ok(s) => s,
            Err(err) => return Err(SysError::Syscall("ptsname()", err)),
        };
        let slave_fd = match retry_on_intr(|| {
            fs::open(
                Path::new(&pts_name),
                OFlags::RDWR | OFlags::NOCTTY,
                Mode::empty(),
            )
        }) {
            Ok(fd) => fd,
            Err(err) => return Err(SysError::Syscall("open()", err)),
        };

        Ok(PtyProc {
            master_fd,
            slave_fd,
            child: Mutex::new(Child {
                pid: None,
                last_status: None,
                final_status: None,
            }),
        })
    }

    /// Duplicate master fd, for handing to the bridge's select loop.
    pub fn dup_master(&self) -> Result<OwnedFd, SysError> {
        retry_on_intr(|| io::dup(&self.master_fd)).map_err(|err| SysError::Syscall("dup()", err))
    }

    /// Fork the shell child, attach it to the pty slave as its
    /// controlling terminal, and run the shell loop in-process. Unlike
    /// a command-capture tool that `exec()`s an external program, the
    /// shell here is not a separate binary: server.c runs it directly
    /// in the forked child (the `exec()`-a-separate-`ysh` path in the
    /// original is dead code), so this does the same.
    pub fn spawn_shell_child(&self) -> Result<(), SysError> {
        let mut locked_child = self.child.lock().unwrap();

        if locked_child.pid.is_some() {
            panic!("attempt to call spawn_shell_child() twice");
        }

        self.prepare_parent()?;

        // SAFETY: the child only runs prepare_child() setup followed by
        // the shell loop and then _exit(); it never returns to the
        // caller's stack past that point, and the parent continues
        // normal execution.
        unsafe {
            match shim::fork() {
                Ok(Fork::Parent(pid)) => {
                    locked_child.pid = Some(pid);
                }
                Ok(Fork::Child) => {
                    if self.prepare_child().is_err() {
                        shim::fast_exit(EXIT_FAILURE);
                    }

                    ShellState::new().run();
                    shim::fast_exit(0);
                }
                Err(err) => {
                    return Err(SysError::Syscall("fork()", err));
                }
            }
        };

        Ok(())
    }

    /// Send signal to child's process group. Used by the bridge as the
    /// first hop of the CTL relay: the shell's own handler forwards it
    /// on to whichever job currently has foreground focus.
    pub fn kill_child(&self, sig: Signal) -> Result<(), SysError> {
        let locked_child = self.child.lock().unwrap();

        if locked_child.pid.is_none() {
            panic!("attempt to call kill_child() before spawn_shell_child()");
        }

        if let Err(err) = process::kill_process_group(locked_child.pid.unwrap(), sig) {
            return Err(SysError::Syscall("kill()", err));
        }

        Ok(())
    }

    /// Wait until spawned child exits.
    pub fn wait_child(&self, wait_mode: PtyWait) -> Result<Option<WaitStatus>, SysError> {
        let mut locked_child = self.child.lock().unwrap();

        if locked_child.pid.is_none() {
            panic!("attempt to call wait_child() before spawn_shell_child()");
        }
        if let Some(final_status) = locked_child.final_status {
            return Ok(Some(final_status));
        }

        let mut wait_opts = WaitOptions::UNTRACED;
        if wait_mode == PtyWait::NoHang {
            wait_opts |= WaitOptions::NOHANG;
        }

        loop {
            let wait_status = match process::waitpid(locked_child.pid, wait_opts) {
                Ok(Some((_, status))) => status,
                Ok(None) => return Ok(None),
                Err(Errno::INTR) => continue,
                Err(err) => return Err(SysError::Syscall("waitpid()", err)),
            };

            locked_child.last_status = Some(wait_status);
            if wait_status.exited() || wait_status.signaled() {
                locked_child.final_status = Some(wait_status);
            }
            return Ok(Some(wait_status));
        }
    }

    fn prepare_parent(&self) -> Result<(), SysError> {
        term::set_tty_mode(&self.master_fd.as_fd(), TtyMode::Canon)?;
        Ok(())
    }

    fn prepare_child(&self) -> Result<(), SysError> {
        // undo whatever signal dispositions/masks this process inherited
        // from the supervisor before becoming the shell
        signal::reset_to_default()?;

        if let Err(err) = retry_on_intr(|| process::setsid()) {
            return Err(SysError::Syscall("setsid()", err));
        }

        if let Err(err) = retry_on_intr(|| process::ioctl_tiocsctty(&self.slave_fd)) {
            return Err(SysError::Syscall("ioctl(TIOCSCTTY)", err));
        }

        for dup_fn in &[
            stdio::dup2_stdin::<&OwnedFd>,
            stdio::dup2_stdout::<&OwnedFd>,
            stdio::dup2_stderr::<&OwnedFd>,
        ] {
            if let Err(err) = retry_on_intr(|| dup_fn(&self.slave_fd)) {
                return Err(SysError::Syscall("dup2()", err));
            }
        }

        signal::install_shell_handlers()?;

        let max_fd = match sysconf(SysconfVariable::ScOpenMax) {
            Ok(n) => n,
            Err(_) => return Err(SysError::Syscall("sysconf(_SC_OPEN_MAX)", Errno::INVAL)),
        };
        unsafe {
            for fd in 3..=max_fd {
                // SAFETY: breaks OwnedFd/BorrowedFd invariants, but this
                // runs single-threaded right after fork(), before any
                // other code has a chance to observe the broken fds.
                shim::close_raw(fd as RawFd);
            }
        };

        Ok(())
    }
}
