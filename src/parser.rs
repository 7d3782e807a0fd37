/// Maximum number of tokens the executor will ever see from one line.
pub const MAX_ARGS: usize = 10;

/// Whitespace-tokenize a command line, capping at `MAX_ARGS` tokens.
/// Extra tokens are silently dropped, mirroring ysh.c's parse_command()
/// (strtok over a fixed-size argv array).
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace()
        .take(MAX_ARGS)
        .map(str::to_string)
        .collect()
}

/// Split a line on the first pipe character. A line with more than one
/// `|` is still a single split on the first occurrence, matching
/// ysh.c's split_pipe() (strtok keeps only the first two pieces).
pub fn split_pipe(line: &str) -> (&str, Option<&str>) {
    match line.find('|') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Detect and strip a trailing background marker. The ampersand may
/// appear anywhere in the line, not only at the end; its presence marks
/// the command as a background job and it is removed before tokenizing.
pub fn strip_background(line: &str) -> (String, bool) {
    if let Some(pos) = line.find('&') {
        let mut stripped = String::with_capacity(line.len() - 1);
        stripped.push_str(&line[..pos]);
        stripped.push_str(&line[pos + 1..]);
        (stripped, true)
    } else {
        (line.to_string(), false)
    }
}

/// Does the line contain a redirection token?
pub fn has_redirection(tokens: &[String]) -> bool {
    tokens.iter().any(|t| t == "<" || t == ">")
}

/// One redirection request extracted from a token stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Redirect {
    Input(String),
    Output(String),
}

/// Scan tokens linearly, splicing out `<`/`>` and their following path
/// token, returning the remaining argv plus the redirections found in
/// left-to-right order (applied in that order by the executor).
pub fn extract_redirections(tokens: &[String]) -> (Vec<String>, Vec<Redirect>) {
    let mut argv = Vec::with_capacity(tokens.len());
    let mut redirects = Vec::new();

    let mut iter = tokens.iter().peekable();
    while let Some(tok) = iter.next() {
        match tok.as_str() {
            "<" => {
                if let Some(path) = iter.next() {
                    redirects.push(Redirect::Input(path.clone()));
                }
            }
            ">" => {
                if let Some(path) = iter.next() {
                    redirects.push(Redirect::Output(path.clone()));
                }
            }
            _ => argv.push(tok.clone()),
        }
    }

    (argv, redirects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(tokenize("ls -la /tmp"), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn tokenize_caps_at_max_args() {
        let line = (0..20).map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
        assert_eq!(tokenize(&line).len(), MAX_ARGS);
    }

    #[test]
    fn split_pipe_returns_none_without_pipe() {
        assert_eq!(split_pipe("ls -la"), ("ls -la", None));
    }

    #[test]
    fn split_pipe_splits_on_first_only() {
        let (left, right) = split_pipe("ls | wc -l | head");
        assert_eq!(left, "ls ");
        assert_eq!(right, Some(" wc -l | head"));
    }

    #[test]
    fn strip_background_detects_and_removes_ampersand() {
        let (stripped, bg) = strip_background("sleep 30 &");
        assert!(bg);
        assert_eq!(stripped, "sleep 30 ");
    }

    #[test]
    fn strip_background_false_when_absent() {
        let (stripped, bg) = strip_background("sleep 30");
        assert!(!bg);
        assert_eq!(stripped, "sleep 30");
    }

    #[test]
    fn extract_redirections_splices_out_markers() {
        let tokens = tokenize("cat < in.txt > out.txt");
        let (argv, redirects) = extract_redirections(&tokens);
        assert_eq!(argv, vec!["cat"]);
        assert_eq!(
            redirects,
            vec![
                Redirect::Input("in.txt".to_string()),
                Redirect::Output("out.txt".to_string()),
            ]
        );
    }

    #[test]
    fn has_redirection_detects_either_marker() {
        assert!(has_redirection(&tokenize("cat < in.txt")));
        assert!(has_redirection(&tokenize("echo hi > out.txt")));
        assert!(!has_redirection(&tokenize("echo hi")));
    }
}
