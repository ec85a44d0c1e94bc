use serde::{Deserialize, Serialize};

use crate::program::ArgumentDict;

/// SLURM resources requested for a job, copied verbatim into the #SBATCH header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    /// number of tasks (`--ntasks`)
    pub nproc: u32,
    /// memory in GB, rendered as MB (`--mem={mem}000`)
    pub mem: u32,
    /// wall time, e.g. `01:00:00`
    pub time: String,
    pub partition: String,
}

/// Everything needed to create a [`Job`](crate::slurm::job::Job) for one generation
///
/// `command` may contain the placeholders `INPUTFILE` and `OUTPUTFILE`, which are replaced with
/// the relative input and output paths when the job is created.
#[derive(Debug, Clone)]
pub struct JobRequest<S> {
    pub jobname: String,
    pub input: Vec<String>,
    pub command: String,
    pub resources: Resources,
    pub subject: S,
    pub arguments: ArgumentDict,
}
