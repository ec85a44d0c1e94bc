//! Resubmission loops
//!
//! Both loops submit, read the output of each run through the program and resubmit runs that
//! came back with warnings, until every run is clean or the try budget is used up.

/// Resubmit one job until it succeeds
pub mod single;
/// Resubmit a set of jobs as one SLURM job array per generation
pub mod batch;

pub use batch::{run_batch, BatchOptions};
pub use single::run;

/// How many generations to submit, and what to do when they run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// maximum number of submissions (generations) per job
    pub tries: u32,
    /// return the last result instead of [`Error::RetriesExhausted`](crate::Error::RetriesExhausted)
    pub ignore_exhaustion: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { tries: 1, ignore_exhaustion: false }
    }
}
