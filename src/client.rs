use crate::config::ClientArgs;
use crate::shim::{self, SigAction};
use crate::term::{self, TtyMode};
use crate::wire;
use rustix::process::Signal;
use rustix::stdio;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicI32, Ordering};

/// Raw socket fd, set once at connect time so the signal handlers below
/// can reach it. Mirrors client.c's global `sockfd`.
static SOCK_FD: AtomicI32 = AtomicI32::new(-1);

/// Sends "CTL c\n" directly from the handler, exactly as client.c's
/// handle_sigint() does (a send() syscall from a signal handler).
extern "C" fn on_sigint(_sig: libc::c_int) {
    send_ctl(b"CTL c\n");
}

/// Sends "CTL z\n", mirroring client.c's handle_sigtstp().
extern "C" fn on_sigtstp(_sig: libc::c_int) {
    send_ctl(b"CTL z\n");
}

fn send_ctl(msg: &[u8]) {
    let fd = SOCK_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        unsafe {
            libc::send(fd, msg.as_ptr() as *const libc::c_void, msg.len(), 0);
        }
    }
}

/// Connect to the server and run the interactive client loop. Mirrors
/// client.c's main(): install signal handlers, connect, loop until
/// disconnect/`quit`/EOF.
pub fn run(args: ClientArgs) -> io::Result<()> {
    let stream = TcpStream::connect((args.server_addr.as_str(), args.port))?;
    SOCK_FD.store(stream.as_raw_fd(), Ordering::SeqCst);

    shim::sigaction(Signal::INT, SigAction::Handler(on_sigint)).ok();
    shim::sigaction(Signal::TSTP, SigAction::Handler(on_sigtstp)).ok();

    println!(
        "Connected to server at {}:{}",
        args.server_addr, args.port
    );

    let saved_term = if term::is_tty(&stdio::stdin()) {
        term::save_tty_state(&stdio::stdin()).ok()
    } else {
        None
    };
    if term::is_tty(&stdio::stdin()) {
        let _ = term::set_tty_mode(&stdio::stdin(), TtyMode::Canon);
    }

    client_loop(stream.try_clone()?, stream);

    if let Some(saved) = saved_term {
        let _ = term::restore_tty_state(&stdio::stdin(), &saved);
    }

    Ok(())
}

fn client_loop(mut read_half: TcpStream, mut write_half: TcpStream) {
    let mut server_buf = [0u8; 1024];
    let mut input = String::new();

    loop {
        let n = match read_half.read(&mut server_buf) {
            Ok(0) | Err(_) => {
                println!("Server disconnected or error occurred.");
                break;
            }
            Ok(n) => n,
        };
        print!("{}", String::from_utf8_lossy(&server_buf[..n]));
        let _ = io::stdout().flush();

        input.clear();
        if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
            break;
        }
        let command = input.trim_end_matches(['\r', '\n']);

        if command == "quit" {
            break;
        }

        let frame = wire::encode_cmd(command);
        if write_half.write_all(&frame).is_err() {
            break;
        }
    }

    let _ = write_half.write_all(&wire::encode_eof());
}
