use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use log::{debug, info, warn};

use crate::error::{Error, Result};

/// Job id assigned by SLURM, used to find the `.out` files of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        RunId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that runs a submission script to completion
pub trait Scheduler {
    /// Submit `script` from `working_dir` and block until the job (or whole job array) finished
    fn submit(&self, script: &Path, working_dir: &Path) -> Result<RunId>;
}

/// Submit with the sbatch command line tool
///
/// Scripts are expected to set `#SBATCH --wait`, so sbatch only exits once the job is done.
#[derive(Debug, Clone)]
pub struct Sbatch {
    pub program: PathBuf,
}

impl Default for Sbatch {
    fn default() -> Self {
        Sbatch { program: PathBuf::from("sbatch") }
    }
}

impl Scheduler for Sbatch {
    fn submit(&self, script: &Path, working_dir: &Path) -> Result<RunId> {
        let mut sbatch = Command::new(&self.program);
        let cmd = sbatch.arg(script).current_dir(working_dir);
        info!("Running sbatch process in {}", working_dir.display());
        debug!("{:?}", &cmd);

        let started = Utc::now();
        let output = cmd
            .output()
            .map_err(|err| Error::Submission(format!("can't run {}: {}", self.program.display(), err)))?;
        let elapsed = Utc::now() - started;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match (parse_acknowledgement(&stdout), output.status.success()) {
            (Some(run_id), true) => {
                info!("SLURM job id: {run_id} (finished after {}s)", elapsed.num_seconds());
                Ok(run_id)
            }
            // with --wait, sbatch relays the job's own exit code: the job ran, let its output decide
            (Some(run_id), false) => {
                warn!("SLURM job {run_id} finished with {} after {}s", output.status, elapsed.num_seconds());
                Ok(run_id)
            }
            (None, true) => Err(Error::Submission(format!("unexpected sbatch output: {:?}", stdout.trim()))),
            (None, false) => Err(Error::Submission(format!("sbatch exited with {}: {}", output.status, stderr.trim()))),
        }
    }
}

/// Find the job id in sbatch output
///
/// sbatch acknowledges a submission with `Submitted batch job <id>`; the id is the last token of
/// that line.
pub fn parse_acknowledgement(stdout: &str) -> Option<RunId> {
    static ACKNOWLEDGEMENT: &str = "Submitted batch job";

    let line = stdout.lines().map(str::trim).find(|line| line.starts_with(ACKNOWLEDGEMENT))?;
    let id = line.split_whitespace().last()?;
    match !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        true => Some(RunId::new(id)),
        false => None,
    }
}
