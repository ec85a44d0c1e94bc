use serde::{Deserialize, Serialize};

use crate::program::scan::ScanConfig;
use crate::program::ArgumentDict;
use crate::slurm::job_request::Resources;

/// A job as written in a request file, before it's turned into a
/// [`JobRequest`](crate::slurm::job_request::JobRequest)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JobEntry {
    pub jobname: String,
    pub input: Vec<String>,
    pub command: String,
    pub resources: Resources,
    #[serde(default)]
    pub arguments: ArgumentDict,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunRequest {
    pub program: ScanConfig,
    pub jobs: Vec<JobEntry>,
}
