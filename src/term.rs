use crate::error::SysError;
use rustix::io::retry_on_intr;
use rustix::termios::{self, LocalModes, OptionalActions, Termios};
use std::os::fd::BorrowedFd;

/// Check if descriptor is a tty.
pub fn is_tty(fd: &BorrowedFd) -> bool {
    termios::isatty(fd)
}

/// Input mode of a tty.
pub enum TtyMode {
    Canon,
}

/// Set the tty's canonical/echo mode.
pub fn set_tty_mode(tty_fd: &BorrowedFd, mode: TtyMode) -> Result<(), SysError> {
    let mut term = match retry_on_intr(|| termios::tcgetattr(tty_fd)) {
        Ok(term) => term,
        Err(err) => return Err(SysError::Syscall("tcgetattr()", err)),
    };

    match mode {
        TtyMode::Canon => term.local_modes |= LocalModes::ICANON,
    };

    if let Err(err) = retry_on_intr(|| termios::tcsetattr(tty_fd, OptionalActions::Now, &term)) {
        return Err(SysError::Syscall("tcsetattr()", err));
    }

    Ok(())
}

/// Save tty state into a variable.
pub fn save_tty_state(tty_fd: &BorrowedFd) -> Result<Termios, SysError> {
    match retry_on_intr(|| termios::tcgetattr(tty_fd)) {
        Ok(term) => Ok(term),
        Err(err) => Err(SysError::Syscall("tcgetattr()", err)),
    }
}

/// Restore tty state from a variable.
pub fn restore_tty_state(tty_fd: &BorrowedFd, term: &Termios) -> Result<(), SysError> {
    if let Err(err) = retry_on_intr(|| termios::tcsetattr(tty_fd, OptionalActions::Now, term)) {
        return Err(SysError::Syscall("tcsetattr()", err));
    }
    Ok(())
}
