use crate::bridge::{self, ClientInfo};
use crate::config::DaemonArgs;
use crate::error::SysError;
use crate::shim;
use crate::syslog::Syslog;
use rustix::fs::{self, FlockOperation, Mode, OFlags};
use rustix::net::{self, AddressFamily, Ipv4Addr, SocketAddrV4, SocketType};
use rustix::process;
use std::net::TcpStream;
use std::os::fd::{AsFd, FromRawFd, IntoRawFd};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

const BACKLOG: u32 = 10;

/// Owns the worker count, as described by §5's "worker count guarded by
/// a mutex" shared resource.
struct WorkerPool {
    active: Mutex<usize>,
    capacity: usize,
}

impl WorkerPool {
    fn new(capacity: usize) -> Self {
        WorkerPool {
            active: Mutex::new(0),
            capacity,
        }
    }

    /// Try to reserve a slot. Returns false (caller must reject the
    /// client) if the pool is already at capacity.
    fn try_acquire(&self) -> bool {
        let mut active = self.active.lock().unwrap();
        if *active >= self.capacity {
            return false;
        }
        *active += 1;
        true
    }

    fn release(&self) {
        let mut active = self.active.lock().unwrap();
        *active = active.saturating_sub(1);
    }
}

/// Fork once, detach from the controlling terminal, become a session and
/// process group leader, and redirect standard streams to /dev/null.
/// Mirrors server.c's create_daemon() (the fork/exit-parent/setsid/chdir/
/// umask/redirect sequence); the single-instance lock is taken
/// separately once the log file is opened for append.
fn daemonize() -> Result<(), SysError> {
    // SAFETY: the parent exits immediately via _exit(); the child
    // continues on to setsid()/chdir()/umask() and never returns to the
    // caller's stack frame from the parent side.
    unsafe {
        match shim::fork().map_err(|err| SysError::Syscall("fork()", err))? {
            shim::Fork::Parent(_) => shim::fast_exit(0),
            shim::Fork::Child => {}
        }
    }

    process::setsid().map_err(|err| SysError::Syscall("setsid()", err))?;
    rustix::process::chdir("/").map_err(|err| SysError::Syscall("chdir()", err))?;
    process::umask(Mode::empty());

    let devnull = fs::open(Path::new("/dev/null"), OFlags::RDWR, Mode::empty())
        .map_err(|err| SysError::Syscall("open(/dev/null)", err))?;
    for dup_fn in &[
        rustix::stdio::dup2_stdin::<&std::os::fd::OwnedFd>,
        rustix::stdio::dup2_stdout::<&std::os::fd::OwnedFd>,
        rustix::stdio::dup2_stderr::<&std::os::fd::OwnedFd>,
    ] {
        dup_fn(&devnull).map_err(|err| SysError::Syscall("dup2()", err))?;
    }

    Ok(())
}

/// Open the append log and try to take an exclusive advisory lock on it.
/// If another instance already holds the lock, this returns `Ok(None)`
/// and the caller exits successfully (single-instance guarantee), per
/// spec.md §4.1.
fn acquire_single_instance(log_path: &Path) -> Result<Option<std::fs::File>, SysError> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|err| SysError::Io("open(log)", err))?;

    match fs::flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive) {
        Ok(()) => Ok(Some(file)),
        Err(rustix::io::Errno::WOULDBLOCK) | Err(rustix::io::Errno::AGAIN) => Ok(None),
        Err(err) => Err(SysError::Syscall("flock()", err)),
    }
}

/// Create, bind and listen a TCP socket with address reuse enabled and a
/// fixed backlog, then hand it back as a std TcpListener for `.incoming()`.
/// Built with rustix directly (rather than std::net::TcpListener) because
/// std gives no control over the listen backlog, which spec.md §4.1
/// fixes at 10.
fn bind_listener(port: u16) -> Result<std::net::TcpListener, SysError> {
    let socket = net::socket(AddressFamily::INET, SocketType::STREAM, None)
        .map_err(|err| SysError::Syscall("socket()", err))?;

    net::sockopt::set_socket_reuseaddr(&socket, true)
        .map_err(|err| SysError::Syscall("setsockopt(SO_REUSEADDR)", err))?;

    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    net::bind(&socket, &addr).map_err(|err| SysError::Syscall("bind()", err))?;

    net::listen(&socket, BACKLOG as i32).map_err(|err| SysError::Syscall("listen()", err))?;

    let raw = socket.into_raw_fd();
    // SAFETY: raw was just taken from an OwnedFd we own exclusively, and
    // this is the only place that reclaims it.
    Ok(unsafe { std::net::TcpListener::from_raw_fd(raw) })
}

/// Entry point for the daemon: `serve()`.
pub fn serve(args: DaemonArgs) -> Result<(), SysError> {
    if !args.foreground {
        daemonize()?;
    }

    let log_path = Path::new(&args.log_path);
    let _lock_guard = match acquire_single_instance(log_path)? {
        Some(file) => file,
        None => return Ok(()),
    };

    let syslog = Arc::new(Syslog::open("yashd"));
    syslog.info("yashd starting");

    let listener = bind_listener(args.port)?;
    let pool = Arc::new(WorkerPool::new(args.max_connections));

    accept_loop(listener, pool, syslog, log_path.to_path_buf())
}

fn accept_loop(
    listener: std::net::TcpListener,
    pool: Arc<WorkerPool>,
    syslog: Arc<Syslog>,
    log_path: std::path::PathBuf,
) -> Result<(), SysError> {
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                syslog.err(&format!("accept() failed: {}", err));
                continue;
            }
        };

        if !pool.try_acquire() {
            syslog.info("connection rejected: worker pool at capacity");
            drop(stream);
            continue;
        }

        let client = match client_info(stream) {
            Ok(client) => client,
            Err(err) => {
                syslog.err(&format!("peer_addr() failed: {}", err));
                pool.release();
                continue;
            }
        };

        let pool = Arc::clone(&pool);
        let syslog = Arc::clone(&syslog);
        let log_path = log_path.clone();

        thread::spawn(move || {
            bridge::run_session(client, &log_path, &syslog);
            pool.release();
        });
    }

    Ok(())
}

fn client_info(stream: TcpStream) -> std::io::Result<ClientInfo> {
    let peer = stream.peer_addr()?;
    Ok(ClientInfo {
        stream,
        peer_addr: peer.ip().to_string(),
        peer_port: peer.port(),
    })
}
