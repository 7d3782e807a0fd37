use std::ffi::CString;

/// Thin wrapper around the three libc syslog entry points the daemon needs.
/// No crate in the example pack wraps syslog, so this follows the same
/// direct-libc-shim idiom as `shim.rs`.
pub struct Syslog {
    ident: CString,
}

impl Syslog {
    /// Open the syslog connection under the given identity, logging to the
    /// daemon facility as `server.c`'s `create_daemon()` does.
    pub fn open(ident: &str) -> Self {
        let ident = CString::new(ident).unwrap_or_else(|_| CString::new("yashd").unwrap());
        unsafe {
            libc::openlog(ident.as_ptr(), libc::LOG_PID | libc::LOG_NDELAY, libc::LOG_DAEMON);
        }
        Syslog { ident }
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        self.write(libc::LOG_INFO, msg);
    }

    /// Log an error message.
    pub fn err(&self, msg: &str) {
        self.write(libc::LOG_ERR, msg);
    }

    fn write(&self, priority: libc::c_int, msg: &str) {
        if let Ok(cmsg) = CString::new(msg) {
            unsafe {
                libc::syslog(priority, c"%s".as_ptr(), cmsg.as_ptr());
            }
        }
    }
}

impl Drop for Syslog {
    fn drop(&mut self) {
        let _ = &self.ident;
        unsafe {
            libc::closelog();
        }
    }
}
