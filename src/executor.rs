use crate::error::SysError;
use crate::job::{JobStatus, JobTable};
use crate::parser::{self, Redirect};
use crate::shim::{self, Fork};
use crate::signal;
use crate::status::*;
use exec::Command;
use rustix::fs::{self, Mode, OFlags};
use rustix::io::Errno;
use rustix::process::{self, Pid, Signal, WaitOptions, WaitStatus};
use rustix::stdio;
use std::path::Path;

/// Apply the redirections collected by the parser to the current process's
/// standard streams. Matches ysh.c's redirection(): `<` opens read-only
/// and dup2s over stdin; `>` opens read-write, creates with mode 0644,
/// and deliberately does NOT truncate, then dup2s over stdout.
fn apply_redirections(redirects: &[Redirect]) -> Result<(), SysError> {
    for redirect in redirects {
        match redirect {
            Redirect::Input(path) => {
                let fd = fs::open(Path::new(path), OFlags::RDONLY, Mode::empty())
                    .map_err(|err| SysError::Syscall("open()", err))?;
                stdio::dup2_stdin(&fd).map_err(|err| SysError::Syscall("dup2()", err))?;
            }
            Redirect::Output(path) => {
                let fd = fs::open(
                    Path::new(path),
                    OFlags::RDWR | OFlags::CREATE,
                    Mode::RUSR | Mode::WUSR | Mode::RGRP | Mode::ROTH,
                )
                .map_err(|err| SysError::Syscall("open()", err))?;
                stdio::dup2_stdout(&fd).map_err(|err| SysError::Syscall("dup2()", err))?;
            }
        }
    }
    Ok(())
}

fn exec_command(argv: &[String]) -> ! {
    let Some(program) = argv.first() else {
        unsafe { shim::fast_exit(EXIT_COMMAND_FAILED) };
    };
    let mut command = Command::new(program);
    command.args(&argv[1..]);
    _ = command.exec();
    eprintln!("{}: command not found", program);
    unsafe { shim::fast_exit(EXIT_COMMAND_FAILED) };
}

/// Run a single command, optionally in the background.
/// Mirrors ysh.c's simple-command path inside ysh_loop()/do a single fork.
pub fn run_simple(
    table: &mut JobTable,
    argv: &[String],
    redirects: &[Redirect],
    background: bool,
    command_line: &str,
) -> Result<(), SysError> {
    if argv.is_empty() {
        return Ok(());
    }

    // SAFETY: the child runs only async-signal-safe setup followed by
    // exec(); the parent continues normal execution.
    let child_pid = unsafe {
        match shim::fork().map_err(|err| SysError::Syscall("fork()", err))? {
            Fork::Child => {
                if let Err(err) = process::setpgid(None, None) {
                    eprintln!("setpgid: {}", err);
                    shim::fast_exit(EXIT_FAILURE);
                }
                signal::reset_to_default().ok();
                if apply_redirections(redirects).is_err() {
                    shim::fast_exit(EXIT_COMMAND_FAILED);
                }
                exec_command(argv);
            }
            Fork::Parent(pid) => pid,
        }
    };

    // Race-proof: set the child's process group from both sides.
    let _ = process::setpgid(Some(child_pid), Some(child_pid));
    let pgid = child_pid.as_raw_nonzero().get();

    if background {
        table.add(pgid, command_line, JobStatus::Running);
        return Ok(());
    }

    signal::set_foreground_pgid(pgid);
    let status = wait_foreground(child_pid)?;
    signal::set_foreground_pgid(0);

    if status.stopped() {
        table.add(pgid, command_line, JobStatus::Suspended);
        table.push_suspended(pgid);
    }

    Ok(())
}

/// Run a two-stage pipeline. Mirrors ysh.c's do_pipe(): a pipe, two
/// forks, each side's pipe fd dup2'd in first and then its own
/// redirections applied (so an explicit `<`/`>` on either side overrides
/// the pipe wiring, exactly as ysh.c's redirection() running after the
/// dup2() in each child does).
pub fn run_pipe(
    table: &mut JobTable,
    left_argv: &[String],
    right_argv: &[String],
    background: bool,
    command_line: &str,
) -> Result<(), SysError> {
    let (left_argv, left_redirects) = parser::extract_redirections(left_argv);
    let (right_argv, right_redirects) = parser::extract_redirections(right_argv);

    let (read_end, write_end) =
        rustix::pipe::pipe().map_err(|err| SysError::Syscall("pipe()", err))?;

    let left_pid = unsafe {
        match shim::fork().map_err(|err| SysError::Syscall("fork()", err))? {
            Fork::Child => {
                drop(read_end);
                if let Err(err) = process::setpgid(None, None) {
                    eprintln!("setpgid: {}", err);
                    shim::fast_exit(EXIT_FAILURE);
                }
                signal::reset_to_default().ok();
                if stdio::dup2_stdout(&write_end).is_err() {
                    shim::fast_exit(EXIT_FAILURE);
                }
                drop(write_end);
                if apply_redirections(&left_redirects).is_err() {
                    shim::fast_exit(EXIT_COMMAND_FAILED);
                }
                exec_command(&left_argv);
            }
            Fork::Parent(pid) => pid,
        }
    };
    let _ = process::setpgid(Some(left_pid), Some(left_pid));
    let left_pgid = left_pid.as_raw_nonzero().get();

    let right_pid = unsafe {
        match shim::fork().map_err(|err| SysError::Syscall("fork()", err))? {
            Fork::Child => {
                drop(write_end);
                // the right side joins the left side's process group so a
                // single kill(-pgid) reaches the whole pipeline.
                if let Err(err) = process::setpgid(None, Some(left_pid)) {
                    eprintln!("setpgid: {}", err);
                    shim::fast_exit(EXIT_FAILURE);
                }
                signal::reset_to_default().ok();
                if stdio::dup2_stdin(&read_end).is_err() {
                    shim::fast_exit(EXIT_FAILURE);
                }
                drop(read_end);
                if apply_redirections(&right_redirects).is_err() {
                    shim::fast_exit(EXIT_COMMAND_FAILED);
                }
                exec_command(&right_argv);
            }
            Fork::Parent(pid) => pid,
        }
    };
    let _ = process::setpgid(Some(right_pid), Some(left_pid));

    drop(read_end);
    drop(write_end);

    if background {
        table.add(left_pgid, command_line, JobStatus::Running);
        return Ok(());
    }

    signal::set_foreground_pgid(left_pgid);
    let left_status = wait_foreground(left_pid)?;
    let right_status = wait_foreground(right_pid)?;
    signal::set_foreground_pgid(0);

    if left_status.stopped() || right_status.stopped() {
        table.add(left_pgid, command_line, JobStatus::Suspended);
        table.push_suspended(left_pgid);
    }

    Ok(())
}

fn wait_foreground(pid: Pid) -> Result<WaitStatus, SysError> {
    loop {
        match process::waitpid(Some(pid), WaitOptions::UNTRACED) {
            Ok(Some((_, status))) => return Ok(status),
            Ok(None) => continue,
            Err(Errno::INTR) => continue,
            Err(err) => return Err(SysError::Syscall("waitpid()", err)),
        }
    }
}

/// Send a signal to a job's process group, as the signal router forwards
/// interrupt/suspend to the current foreground job.
pub fn forward_signal(table: &JobTable, pgid: i32, sig: Signal) -> Result<(), SysError> {
    if table.find(pgid).is_some() {
        let pid = Pid::from_raw(pgid).ok_or(SysError::Other("invalid pgid"))?;
        process::kill_process_group(pid, sig).map_err(|err| SysError::Syscall("kill()", err))?;
    }
    Ok(())
}

/// Non-blockingly reap any exited/stopped children and update the table.
/// Called from the shell loop after draining the SIGCHLD-pending flag,
/// with SIGCHLD blocked for the duration of the mutation.
pub fn reap_children(table: &mut JobTable) {
    loop {
        match process::waitpid(None, WaitOptions::UNTRACED | WaitOptions::NOHANG) {
            Ok(Some((pid, status))) => {
                let pgid = pid.as_raw_nonzero().get();
                if status.stopped() {
                    if let Some(job) = table.find_mut(pgid) {
                        job.status = JobStatus::Suspended;
                    }
                    table.push_suspended(pgid);
                } else if status.exited() || status.signaled() {
                    table.remove(pgid);
                }
            }
            Ok(None) => break,
            Err(Errno::INTR) => continue,
            Err(_) => break,
        }
    }
}
