use crate::executor;
use crate::job::{JobStatus, JobTable};
use crate::parser::{self, Redirect};
use crate::signal;
use rustix::process::Signal;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Per-shell-process state: the job table and the line editor. One
/// instance lives for the lifetime of one PTY child.
pub struct ShellState {
    jobs: JobTable,
    editor: DefaultEditor,
}

impl ShellState {
    pub fn new() -> Self {
        ShellState {
            jobs: JobTable::default(),
            editor: DefaultEditor::new().expect("failed to initialize line editor"),
        }
    }

    /// Run the prompt-read-parse-dispatch cycle until EOF.
    /// Mirrors ysh.c's ysh_loop().
    pub fn run(&mut self) {
        loop {
            self.drain_child_events();

            match self.editor.readline("# ") {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());
                    self.dispatch(&line);
                }
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Interrupted) => continue,
                Err(_) => break,
            }
        }
    }

    fn drain_child_events(&mut self) {
        if signal::take_child_pending() {
            signal::block_sigchld(|| {
                executor::reap_children(&mut self.jobs);
            });
        }
    }

    fn dispatch(&mut self, raw_line: &str) {
        let line = raw_line.trim_end_matches(['\r', '\n']);

        if line == "jobs" {
            print!("{}", self.jobs.list());
            return;
        }
        if line == "fg" || line.starts_with("fg ") {
            self.fg_command();
            return;
        }
        if line == "bg" || line.starts_with("bg ") {
            self.bg_command();
            return;
        }
        let (line, background) = parser::strip_background(line);

        let (left, right) = parser::split_pipe(&line);
        if let Some(right) = right {
            let left_tokens = parser::tokenize(left);
            let right_tokens = parser::tokenize(right);
            if left_tokens.is_empty() || right_tokens.is_empty() {
                return;
            }
            if let Err(err) =
                executor::run_pipe(&mut self.jobs, &left_tokens, &right_tokens, background, raw_line)
            {
                eprintln!("{}", err);
            } else if background {
                if let Some(job) = self.jobs.jobs().last() {
                    println!("[{}] {} {}", job.id, job.pgid, job.command);
                }
            }
            return;
        }

        let tokens = parser::tokenize(&line);
        if tokens.is_empty() {
            return;
        }

        let (argv, redirects) = if parser::has_redirection(&tokens) {
            parser::extract_redirections(&tokens)
        } else {
            (tokens, Vec::new())
        };

        if argv.is_empty() {
            return;
        }

        if background {
            if let Err(err) =
                executor::run_simple(&mut self.jobs, &argv, &redirects, true, raw_line)
            {
                eprintln!("{}", err);
            } else if let Some(job) = self.jobs.jobs().last() {
                println!("[{}] {} {}", job.id, job.pgid, job.command);
            }
            return;
        }

        if let Err(err) = executor::run_simple(&mut self.jobs, &argv, &redirects, false, raw_line) {
            eprintln!("{}", err);
        }
    }

    fn fg_command(&mut self) {
        let Some(pgid) = self.jobs.peek_suspended() else {
            println!("fg: no current job");
            return;
        };

        if executor::forward_signal(&self.jobs, pgid, Signal::CONT).is_err() {
            return;
        }
        self.jobs.pop_suspended();
        if let Some(job) = self.jobs.find_mut(pgid) {
            job.status = JobStatus::Running;
            println!("[{}] continued {}", job.id, job.command);
        }

        signal::set_foreground_pgid(pgid);
        let Ok(pid) = rustix::process::Pid::from_raw(pgid).ok_or(()) else {
            signal::set_foreground_pgid(0);
            return;
        };
        let status = wait_stop_or_exit(pid);
        signal::set_foreground_pgid(0);

        match status {
            Some(true) => {
                if let Some(job) = self.jobs.find_mut(pgid) {
                    job.status = JobStatus::Suspended;
                }
                self.jobs.push_suspended(pgid);
            }
            _ => {
                self.jobs.remove(pgid);
            }
        }
    }

    fn bg_command(&mut self) {
        let Some(pgid) = self.jobs.peek_suspended() else {
            println!("bg: no current job");
            return;
        };

        if executor::forward_signal(&self.jobs, pgid, Signal::CONT).is_err() {
            return;
        }
        self.jobs.pop_suspended();
        if let Some(job) = self.jobs.find_mut(pgid) {
            job.status = JobStatus::Running;
            println!("[{}] {} &", job.id, job.command);
        }
    }
}

/// Wait for a foregrounded job brought back via `fg`, reporting whether
/// it stopped again (true) or ran to completion/termination (false).
fn wait_stop_or_exit(pid: rustix::process::Pid) -> Option<bool> {
    use rustix::io::Errno;
    use rustix::process::{self, WaitOptions};

    loop {
        match process::waitpid(Some(pid), WaitOptions::UNTRACED) {
            Ok(Some((_, status))) => return Some(status.stopped()),
            Ok(None) => continue,
            Err(Errno::INTR) => continue,
            Err(_) => return None,
        }
    }
}
