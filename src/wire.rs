use crate::error::SysError;

/// One message exchanged between the client and the bridge.
///
/// Matches server.c's handle_client(): the prefix determines the kind,
/// the trailing newline (if any) is stripped before the payload is
/// handed to the shell, and a literal "EOF\n" ends the session.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// `CMD <text>\n` — a line to feed to the shell's stdin.
    Cmd(String),
    /// `CTL c\n` / `CTL z\n` — an out-of-band control character.
    Ctl(char),
    /// `EOF\n` — the client is done.
    Eof,
    /// Anything that doesn't match a known prefix is forwarded to the
    /// shell's stdin as-is, matching the original's fallthrough send().
    Raw(Vec<u8>),
}

/// Decode one recv()-sized chunk into a frame. The wire protocol is one
/// frame per recv() call, not line-buffered: a single read() that
/// straddles two "CMD ...\n" writes is not reassembled, matching the
/// original C server's behavior of treating every read() as one message.
pub fn decode(buf: &[u8]) -> Frame {
    if buf == b"EOF\n" {
        return Frame::Eof;
    }

    if let Some(rest) = buf.strip_prefix(b"CTL ") {
        let rest = strip_trailing_newline(rest);
        if rest.len() == 1 {
            return Frame::Ctl(rest[0] as char);
        }
        return Frame::Raw(buf.to_vec());
    }

    if let Some(rest) = buf.strip_prefix(b"CMD ") {
        let rest = strip_trailing_newline(rest);
        return Frame::Cmd(String::from_utf8_lossy(rest).into_owned());
    }

    Frame::Raw(buf.to_vec())
}

fn strip_trailing_newline(buf: &[u8]) -> &[u8] {
    match buf.strip_suffix(b"\n") {
        Some(rest) => rest,
        None => buf,
    }
}

/// Encode a command line for the wire, as client.c's send_command() does.
pub fn encode_cmd(command: &str) -> Vec<u8> {
    format!("CMD {}\n", command).into_bytes()
}

/// Encode a control character, as client.c's handle_sigint/handle_sigtstp do.
pub fn encode_ctl(c: char) -> Vec<u8> {
    format!("CTL {}\n", c).into_bytes()
}

/// Encode the end-of-session marker.
pub fn encode_eof() -> Vec<u8> {
    b"EOF\n".to_vec()
}

/// Validate that a decoded raw frame isn't simply malformed input worth
/// surfacing as a protocol error to the caller (used by the bridge when
/// deciding whether to log a warning).
pub fn is_recognized(frame: &Frame) -> Result<(), SysError> {
    match frame {
        Frame::Raw(bytes) if bytes.is_empty() => {
            Err(SysError::Protocol("empty message"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_cmd() {
        assert_eq!(decode(b"CMD ls -la\n"), Frame::Cmd("ls -la".to_string()));
    }

    #[test]
    fn decodes_cmd_without_trailing_newline() {
        assert_eq!(decode(b"CMD ls"), Frame::Cmd("ls".to_string()));
    }

    #[test]
    fn decodes_ctl_c() {
        assert_eq!(decode(b"CTL c\n"), Frame::Ctl('c'));
    }

    #[test]
    fn decodes_ctl_z() {
        assert_eq!(decode(b"CTL z\n"), Frame::Ctl('z'));
    }

    #[test]
    fn decodes_eof() {
        assert_eq!(decode(b"EOF\n"), Frame::Eof);
    }

    #[test]
    fn falls_back_to_raw() {
        assert_eq!(decode(b"hello\n"), Frame::Raw(b"hello\n".to_vec()));
    }

    #[test]
    fn empty_cmd_body_is_empty_string() {
        assert_eq!(decode(b"CMD \n"), Frame::Cmd(String::new()));
    }

    #[test]
    fn round_trips_cmd_encoding() {
        let encoded = encode_cmd("echo hi");
        assert_eq!(decode(&encoded), Frame::Cmd("echo hi".to_string()));
    }

    #[test]
    fn round_trips_ctl_encoding() {
        let encoded = encode_ctl('c');
        assert_eq!(decode(&encoded), Frame::Ctl('c'));
    }

    #[test]
    fn empty_raw_is_rejected() {
        assert!(is_recognized(&Frame::Raw(Vec::new())).is_err());
    }
}
