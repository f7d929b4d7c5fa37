//! Cooperative job scheduler.
//!
//! A single virtual timeline of one-shot and repeating jobs. Nothing runs
//! on its own thread: the owner advances time and dispatches whatever falls
//! due, one job at a time, so a job may cancel or schedule others before
//! the next one fires.
//!
//! ```ignore
//! let mut sched = Scheduler::new();
//! let tick = sched.every(Duration::from_secs(1), Job::Tick);
//! let target = sched.now() + Duration::from_secs(3);
//! while let Some((handle, job)) = sched.pop_due(target) {
//!     dispatch(handle, job);
//! }
//! sched.settle(target);
//! sched.cancel(tick);
//! ```

use std::time::Duration;

/// Identifies a scheduled job. Cancelling an unknown or finished handle is
/// a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

#[derive(Debug)]
struct Entry<J> {
    handle: JobHandle,
    due_ms: u64,
    period_ms: Option<u64>,
    /// Tie-breaker: FIFO among equal deadlines.
    seq: u64,
    job: J,
}

#[derive(Debug)]
pub struct Scheduler<J> {
    now_ms: u64,
    next_id: u64,
    next_seq: u64,
    entries: Vec<Entry<J>>,
}

impl<J: Clone> Scheduler<J> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 1,
            next_seq: 0,
            entries: Vec::new(),
        }
    }

    /// Current virtual time since the scheduler was created.
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms)
    }

    /// Schedule `job` to fire every `period`, first after one period.
    pub fn every(&mut self, period: Duration, job: J) -> JobHandle {
        let period_ms = to_ms(period).max(1);
        self.push(period_ms, Some(period_ms), job)
    }

    /// Schedule `job` to fire once after `delay`.
    pub fn after(&mut self, delay: Duration, job: J) -> JobHandle {
        self.push(to_ms(delay), None, job)
    }

    pub fn cancel(&mut self, handle: JobHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        before != self.entries.len()
    }

    pub fn is_scheduled(&self, handle: JobHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time until the earliest job is due, `None` when nothing is scheduled.
    pub fn next_due(&self) -> Option<Duration> {
        self.entries
            .iter()
            .map(|e| e.due_ms)
            .min()
            .map(|due| Duration::from_millis(due.saturating_sub(self.now_ms)))
    }

    /// Pop the next job due at or before the absolute virtual time `until`.
    ///
    /// Moves the clock to the job's deadline. Repeating jobs are re-armed
    /// one period later.
    pub fn pop_due(&mut self, until: Duration) -> Option<(JobHandle, J)> {
        let until_ms = to_ms(until);
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_ms <= until_ms)
            .min_by_key(|(_, e)| (e.due_ms, e.seq))
            .map(|(i, _)| i)?;

        let due_ms = self.entries[idx].due_ms;
        self.now_ms = self.now_ms.max(due_ms);

        match self.entries[idx].period_ms {
            Some(period_ms) => {
                let seq = self.bump_seq();
                let entry = &mut self.entries[idx];
                entry.due_ms = due_ms + period_ms;
                entry.seq = seq;
                Some((entry.handle, entry.job.clone()))
            }
            None => {
                let entry = self.entries.remove(idx);
                Some((entry.handle, entry.job))
            }
        }
    }

    /// Move the clock forward to `at` once all due jobs are dispatched.
    pub fn settle(&mut self, at: Duration) {
        self.now_ms = self.now_ms.max(to_ms(at));
    }

    /// Advance by `by`, collecting every job that fires on the way.
    ///
    /// Jobs are collected up front, so a job fired here cannot cancel one
    /// that fires later in the same window. Owners that need that use
    /// [`Scheduler::pop_due`].
    pub fn advance(&mut self, by: Duration) -> Vec<(JobHandle, J)> {
        let target = self.now() + by;
        let mut fired = Vec::new();
        while let Some(job) = self.pop_due(target) {
            fired.push(job);
        }
        self.settle(target);
        fired
    }

    fn push(&mut self, delay_ms: u64, period_ms: Option<u64>, job: J) -> JobHandle {
        let handle = JobHandle(self.next_id);
        self.next_id += 1;
        let seq = self.bump_seq();
        self.entries.push(Entry {
            handle,
            due_ms: self.now_ms + delay_ms,
            period_ms,
            seq,
            job,
        });
        handle
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

impl<J: Clone> Default for Scheduler<J> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
