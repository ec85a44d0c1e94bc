//! The program collaborator decides what a job's files look like, whether a finished run is good,
//! and how to patch a failed run before the next try.

use std::fmt::Debug;
use std::path::Path;

use serde_json::{Map, Value};

use crate::slurm::job::Job;
use crate::slurm::job_request::JobRequest;

/// A configurable program that scans output files for failure markers
pub mod scan;

/// Free-form state threaded from one try to the next; only the program interprets it
pub type ArgumentDict = Map<String, Value>;

/// The payload computed by a job
///
/// An empty warnings list means the run succeeded.
pub trait Subject: Clone + Debug {
    fn warnings(&self) -> &[String];
}

pub trait Program: Sized {
    type Subject: Subject;

    /// Input path templates with `{dir}`, `{jobname}` and `{try_count}` placeholders
    ///
    /// `{dir}` renders with a trailing `/`, or as an empty string for relative paths.
    fn infiles(&self) -> &[String];

    /// Output path templates, same placeholders as [`Program::infiles`]
    fn outfiles(&self) -> &[String];

    /// Parse a finished run. `scheduler_log` is the `.out` file written by SLURM.
    fn read_output(&self, job: &Job<Self>, scheduler_log: &Path) -> anyhow::Result<Self::Subject>;

    /// Return patched arguments for the next try, based on the failed subject
    fn fix_errors(
        &self,
        failed: &Self::Subject,
        basename: &Path,
        arguments: &ArgumentDict,
    ) -> anyhow::Result<ArgumentDict>;

    /// Build the request for generation `try_count` from patched arguments
    fn resubmit(
        &self,
        arguments: ArgumentDict,
        try_count: u32,
    ) -> anyhow::Result<JobRequest<Self::Subject>>;
}

/// What the resubmission loop knows about the latest run of a job
#[derive(Debug, Clone)]
pub enum Attempt<S> {
    NotYetAttempted,
    Evaluated(S),
}
