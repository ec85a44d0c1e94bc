use std::fs;
use std::io;
use std::path::Path;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::program::{ArgumentDict, Program, Subject};
use crate::request::job::JobEntry;
use crate::slurm::job::Job;
use crate::slurm::job_request::{JobRequest, Resources};

/// Warning raised when neither the program output nor the SLURM log exists
pub const MISSING_OUTPUT: &str = "missing output";
/// Warning raised when a success marker is configured but not found
pub const MISSING_SUCCESS_MARKER: &str = "missing success marker";

/// argument key holding the job as it should be recreated
const JOB_KEY: &str = "job";
/// argument key holding the warnings of every failed try, oldest first
const HISTORY_KEY: &str = "history";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    pub infiles: Vec<String>,
    pub outfiles: Vec<String>,
    /// Any of these strings in the output fails the run, the marker becomes the warning
    #[serde(default)]
    pub failure_markers: Vec<String>,
    #[serde(default)]
    pub success_marker: Option<String>,
    #[serde(default)]
    pub fixes: Vec<Fix>,
}

/// Text substitution applied to every input when a run failed with warning `when`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Fix {
    pub when: String,
    pub replace: String,
    pub with: String,
}

/// Result of scanning one run
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub jobname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_count: Option<u32>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// A record for a job that hasn't run yet
    pub fn pending(jobname: &str) -> Self {
        Record { jobname: jobname.to_string(), try_count: None, warnings: Vec::new(), evaluated_at: None }
    }
}

impl Subject for Record {
    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// What's stored in the arguments so that a failed job can be recreated
#[derive(Debug, Clone, Deserialize, Serialize)]
struct StoredJob {
    jobname: String,
    input: Vec<String>,
    command: String,
    resources: Resources,
}

/// A program that judges runs by scanning their output for marker strings
///
/// Failed runs are patched with the configured [`Fix`]es and rerun with the same command and
/// resources.
#[derive(Debug, Clone)]
pub struct OutputScan {
    config: ScanConfig,
}

impl OutputScan {
    pub fn new(config: ScanConfig) -> Self {
        OutputScan { config }
    }

    /// Turn a request file entry into the first generation request
    pub fn request(&self, entry: JobEntry) -> anyhow::Result<JobRequest<Record>> {
        let JobEntry { jobname, input, command, resources, mut arguments } = entry;
        let stored = StoredJob { jobname, input, command, resources };
        arguments.insert(JOB_KEY.to_string(), serde_json::to_value(&stored)?);

        Ok(JobRequest {
            subject: Record::pending(&stored.jobname),
            jobname: stored.jobname,
            input: stored.input,
            command: stored.command,
            resources: stored.resources,
            arguments,
        })
    }

    fn scan(&self, text: &str) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .config
            .failure_markers
            .iter()
            .filter(|marker| text.contains(marker.as_str()))
            .cloned()
            .collect();

        if let Some(marker) = &self.config.success_marker {
            if !text.contains(marker.as_str()) {
                warnings.push(MISSING_SUCCESS_MARKER.to_string());
            }
        }
        warnings
    }
}

impl Program for OutputScan {
    type Subject = Record;

    fn infiles(&self) -> &[String] {
        &self.config.infiles
    }

    fn outfiles(&self) -> &[String] {
        &self.config.outfiles
    }

    fn read_output(&self, job: &Job<Self>, scheduler_log: &Path) -> anyhow::Result<Record> {
        let mut text = String::new();
        let mut found = false;

        for path in [job.output_path_abs(), scheduler_log] {
            match fs::read_to_string(path) {
                Ok(content) => {
                    debug!("Scanning {}", path.display());
                    found = true;
                    text.push_str(&content);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("No output at {}", path.display());
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Can't read output {}", path.display()));
                }
            }
        }

        let warnings = match found {
            true => self.scan(&text),
            false => vec![MISSING_OUTPUT.to_string()],
        };
        if !warnings.is_empty() {
            warn!("{} try {} finished with warnings: {:?}", job.jobname(), job.try_count(), warnings);
        }

        Ok(Record {
            jobname: job.jobname().to_string(),
            try_count: Some(job.try_count()),
            warnings,
            evaluated_at: Some(Utc::now()),
        })
    }

    fn fix_errors(&self, failed: &Record, basename: &Path, arguments: &ArgumentDict) -> anyhow::Result<ArgumentDict> {
        let mut arguments = arguments.clone();
        let mut stored = stored_job(&arguments)?;

        for fix in self.config.fixes.iter().filter(|fix| failed.warnings.contains(&fix.when)) {
            info!("Applying fix for '{}' to {}", fix.when, basename.display());
            for input in stored.input.iter_mut() {
                *input = input.replace(&fix.replace, &fix.with);
            }
        }

        match arguments.entry(HISTORY_KEY).or_insert_with(|| Value::Array(Vec::new())) {
            Value::Array(history) => history.push(serde_json::to_value(&failed.warnings)?),
            _ => return Err(anyhow!("argument '{HISTORY_KEY}' is not a list")),
        }
        arguments.insert(JOB_KEY.to_string(), serde_json::to_value(&stored)?);

        Ok(arguments)
    }

    fn resubmit(&self, arguments: ArgumentDict, try_count: u32) -> anyhow::Result<JobRequest<Record>> {
        let StoredJob { jobname, input, command, resources } = stored_job(&arguments)?;
        debug!("Rebuilding {jobname} for try {try_count}");

        Ok(JobRequest { subject: Record::pending(&jobname), jobname, input, command, resources, arguments })
    }
}

fn stored_job(arguments: &ArgumentDict) -> anyhow::Result<StoredJob> {
    let value = arguments
        .get(JOB_KEY)
        .ok_or_else(|| anyhow!("arguments have no '{JOB_KEY}' entry"))?;
    StoredJob::deserialize(value).context("Can't read stored job from arguments")
}
