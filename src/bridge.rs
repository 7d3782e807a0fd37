use crate::error::SysError;
use crate::pty::{PtyProc, PtyWait};
use crate::shim::{self, SelectFd};
use crate::syslog::Syslog;
use crate::wire::{self, Frame};
use chrono::Local;
use rustix::process::Signal;
use std::fs::OpenOptions;
use std::io::Write;
use std::net::TcpStream;
use std::os::fd::AsFd;
use std::path::Path;

const SOCKET_CHUNK: usize = 1024;
const MASTER_CHUNK: usize = 1023;

/// Everything one worker thread needs to know about its client.
pub struct ClientInfo {
    pub stream: TcpStream,
    pub peer_addr: String,
    pub peer_port: u16,
}

/// Run one client's full session: open the PTY, launch the shell child,
/// then multiplex the socket and PTY master until one side closes or an
/// `EOF\n` is received. Mirrors server.c's handle_client().
pub fn run_session(client: ClientInfo, log_path: &Path, syslog: &Syslog) {
    let pty = match PtyProc::open() {
        Ok(pty) => pty,
        Err(err) => {
            syslog.err(&format!("openpt failed: {}", err));
            return;
        }
    };

    if let Err(err) = pty.spawn_shell_child() {
        syslog.err(&format!("spawn_shell_child failed: {}", err));
        return;
    }

    let master_fd = match pty.dup_master() {
        Ok(fd) => fd,
        Err(err) => {
            syslog.err(&format!("dup_master failed: {}", err));
            return;
        }
    };

    let mut log_file = OpenOptions::new().create(true).append(true).open(log_path).ok();

    if let Err(err) = multiplex(&client, &pty, master_fd.as_fd(), &mut log_file) {
        syslog.err(&format!("session {}:{} ended: {}", client.peer_addr, client.peer_port, err));
    }

    // The shell child is left to be reaped by init; we don't wait for it.
    let _ = pty.wait_child(PtyWait::NoHang);
}

fn multiplex(
    client: &ClientInfo,
    pty: &PtyProc,
    master_fd: std::os::fd::BorrowedFd,
    log_file: &mut Option<std::fs::File>,
) -> Result<(), SysError> {
    let socket_fd = client.stream.as_fd();
    let mut socket_buf = [0u8; SOCKET_CHUNK];
    let mut master_buf = [0u8; MASTER_CHUNK];

    loop {
        let mut socket_sel = SelectFd {
            fd: socket_fd,
            mask: SelectFd::READABLE,
        };
        let mut master_sel = SelectFd {
            fd: master_fd,
            mask: SelectFd::READABLE,
        };

        if let Err(err) = shim::select(&mut [&mut socket_sel, &mut master_sel], None) {
            if err == rustix::io::Errno::INTR {
                continue;
            }
            return Err(SysError::Syscall("select()", err));
        }

        if socket_sel.mask & SelectFd::READABLE != 0 {
            let n = shim::read(socket_fd, &mut socket_buf).map_err(|err| SysError::Syscall("read()", err))?;
            if n == 0 {
                return Ok(());
            }

            let frame = wire::decode(&socket_buf[..n]);
            match frame {
                Frame::Eof => return Ok(()),
                Frame::Cmd(text) => {
                    log_command(client, log_file, &text);
                    let mut payload = text.into_bytes();
                    payload.push(b'\n');
                    shim::write(master_fd, &payload).map_err(|err| SysError::Syscall("write()", err))?;
                }
                Frame::Ctl('c') => {
                    pty.kill_child(Signal::INT)?;
                }
                Frame::Ctl('z') => {
                    pty.kill_child(Signal::TSTP)?;
                }
                Frame::Ctl(_) => {}
                Frame::Raw(bytes) => {
                    shim::write(master_fd, &bytes).map_err(|err| SysError::Syscall("write()", err))?;
                }
            }
        }

        if master_sel.mask & SelectFd::READABLE != 0 {
            let n = shim::read(master_fd, &mut master_buf).map_err(|err| SysError::Syscall("read()", err))?;
            if n == 0 {
                return Ok(());
            }
            if shim::write(socket_fd, &master_buf[..n]).is_err() {
                return Ok(());
            }
        }
    }
}

fn log_command(client: &ClientInfo, log_file: &mut Option<std::fs::File>, payload: &str) {
    let Some(file) = log_file.as_mut() else {
        return;
    };
    let now = Local::now().format("%b %d %H:%M:%S");
    let line = format!(
        "{} yashd[{}:{}]: {}\n",
        now, client.peer_addr, client.peer_port, payload
    );
    let _ = file.write_all(line.as_bytes());
}
