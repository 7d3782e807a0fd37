use rustix::io::Errno;
use std::fmt;
use std::io;

/// Error type shared by every fallible operation below the CLI layer.
#[derive(Debug)]
pub enum SysError {
    /// A named syscall failed with the given errno.
    Syscall(&'static str, Errno),
    /// A `std::io` operation failed (used where `rustix`/`libc` aren't
    /// the caller, e.g. `TcpStream`/`TcpListener`).
    Io(&'static str, io::Error),
    /// A client sent something that doesn't parse as a wire frame.
    Protocol(&'static str),
    /// Anything else that doesn't fit the categories above.
    Other(&'static str),
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SysError::Syscall(what, errno) => write!(f, "{}: {}", what, errno),
            SysError::Io(what, err) => write!(f, "{}: {}", what, err),
            SysError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            SysError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SysError {}

impl From<io::Error> for SysError {
    fn from(err: io::Error) -> Self {
        SysError::Io("io", err)
    }
}
