/// Status of a job tracked by the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Suspended,
    Done,
}

/// One launched user command: a single process or a pipeline, identified
/// by its process-group leader.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u32,
    pub pgid: i32,
    pub status: JobStatus,
    pub command: String,
}

const MAX_COMMAND_LEN: usize = 255;
const SUSPENDED_STACK_CAPACITY: usize = 100;
const DEFAULT_MAX_JOBS: usize = 20;

/// Ordered list of live jobs plus the LIFO stack of suspended pgids.
/// Mirrors ysh.c's linked list + stopped_stack, reshaped onto `Vec`s.
pub struct JobTable {
    jobs: Vec<Job>,
    suspended: Vec<i32>,
    next_id: u32,
    max_jobs: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS)
    }
}

impl JobTable {
    pub fn new(max_jobs: usize) -> Self {
        JobTable {
            jobs: Vec::new(),
            suspended: Vec::new(),
            next_id: 1,
            max_jobs,
        }
    }

    /// Add a job, assigning the next never-reused identifier.
    pub fn add(&mut self, pgid: i32, command: &str, status: JobStatus) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let mut truncated = command.to_string();
        truncated.truncate(MAX_COMMAND_LEN);

        if self.jobs.len() < self.max_jobs {
            self.jobs.push(Job {
                id,
                pgid,
                status,
                command: truncated,
            });
        }

        id
    }

    /// Remove the first job whose pgid matches.
    pub fn remove(&mut self, pgid: i32) -> Option<Job> {
        let pos = self.jobs.iter().position(|j| j.pgid == pgid)?;
        self.suspended.retain(|&p| p != pgid);
        Some(self.jobs.remove(pos))
    }

    /// Linear search by pgid.
    pub fn find(&self, pgid: i32) -> Option<&Job> {
        self.jobs.iter().find(|j| j.pgid == pgid)
    }

    pub fn find_mut(&mut self, pgid: i32) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.pgid == pgid)
    }

    /// Push a pgid onto the suspended stack (capacity-bounded).
    pub fn push_suspended(&mut self, pgid: i32) {
        if self.suspended.len() < SUSPENDED_STACK_CAPACITY {
            self.suspended.push(pgid);
        }
    }

    /// Pop the top of the suspended stack.
    pub fn pop_suspended(&mut self) -> Option<i32> {
        self.suspended.pop()
    }

    /// Peek the top of the suspended stack without removing it.
    pub fn peek_suspended(&self) -> Option<i32> {
        self.suspended.last().copied()
    }

    /// Render the job list the way `jobs` prints it:
    /// `[id] status PGID: pgid command`, one line per job, insertion order.
    pub fn list(&self) -> String {
        let current = self.peek_suspended();
        let mut out = String::new();
        for job in &self.jobs {
            let status_column = match job.status {
                JobStatus::Running => "Running".to_string(),
                JobStatus::Done => "Done".to_string(),
                JobStatus::Suspended => {
                    if current == Some(job.pgid) {
                        "+ Suspended".to_string()
                    } else {
                        "- Suspended".to_string()
                    }
                }
            };
            out.push_str(&format!(
                "[{}] {}   PGID: {}   {}\n",
                job.id, status_column, job.pgid, job.command
            ));
        }
        out
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_not_reused() {
        let mut table = JobTable::new(20);
        let id1 = table.add(100, "sleep 5", JobStatus::Running);
        let id2 = table.add(101, "sleep 6", JobStatus::Running);
        assert!(id2 > id1);
        table.remove(100);
        let id3 = table.add(102, "sleep 7", JobStatus::Running);
        assert!(id3 > id2);
    }

    #[test]
    fn suspended_stack_is_lifo() {
        let mut table = JobTable::new(20);
        table.push_suspended(10);
        table.push_suspended(20);
        assert_eq!(table.peek_suspended(), Some(20));
        assert_eq!(table.pop_suspended(), Some(20));
        assert_eq!(table.pop_suspended(), Some(10));
        assert_eq!(table.pop_suspended(), None);
    }

    #[test]
    fn remove_drops_from_suspended_stack_too() {
        let mut table = JobTable::new(20);
        table.add(10, "sleep 5", JobStatus::Suspended);
        table.push_suspended(10);
        table.remove(10);
        assert_eq!(table.peek_suspended(), None);
    }

    #[test]
    fn list_marks_current_suspended_job() {
        let mut table = JobTable::new(20);
        table.add(10, "sleep 5", JobStatus::Suspended);
        table.add(20, "sleep 6", JobStatus::Suspended);
        table.push_suspended(10);
        table.push_suspended(20);
        let rendered = table.list();
        assert!(rendered.contains("[2] + Suspended   PGID: 20   sleep 6"));
        assert!(rendered.contains("[1] - Suspended   PGID: 10   sleep 5"));
    }

    #[test]
    fn command_text_is_truncated() {
        let mut table = JobTable::new(20);
        let long_command = "x".repeat(400);
        table.add(10, &long_command, JobStatus::Running);
        assert_eq!(table.jobs()[0].command.len(), MAX_COMMAND_LEN);
    }

    #[test]
    fn capacity_limit_is_respected() {
        let mut table = JobTable::new(2);
        table.add(1, "a", JobStatus::Running);
        table.add(2, "b", JobStatus::Running);
        table.add(3, "c", JobStatus::Running);
        assert_eq!(table.jobs().len(), 2);
    }

    #[test]
    fn find_returns_matching_job() {
        let mut table = JobTable::new(20);
        table.add(42, "echo hi", JobStatus::Running);
        assert!(table.find(42).is_some());
        assert!(table.find(43).is_none());
    }
}
