use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use log::info;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::{Error, Result};
use crate::program::Program;
use crate::slurm::job::Job;
use crate::slurm::job_request::Resources;

/// Array tasks find their command file through this variable, expanded by bash at run time
const TASK_ID: &str = "${SLURM_ARRAY_TASK_ID}";

/// Rendering context for a single job script
#[derive(Serialize)]
struct SingleContext<'a> {
    jobname: &'a str,
    partition: &'a str,
    mem: u32,
    nproc: u32,
    time: &'a str,
    command: &'a str,
}

/// Rendering context for a job array script
#[derive(Serialize)]
struct BatchContext<'a> {
    jobname: &'a str,
    partition: &'a str,
    mem: u32,
    nproc: u32,
    time: &'a str,
    array: String,
    task_id: &'a str,
    try_count: u32,
}

/// Rendering context for the command file run by one array task
#[derive(Serialize)]
struct CommandContext<'a> {
    dir: String,
    command: &'a str,
}

/// Render the sbatch script for one job
///
/// The script sets `--wait`, so sbatch only returns once the job has finished. SLURM writes the
/// job's stdout to `{jobname}-{job id}.out` in the job directory.
pub fn single<P: Program>(job: &Job<P>) -> Result<String> {
    /// included single job template
    static SINGLE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/single.txt"));
    let resources: &Resources = job.resources();
    let context = SingleContext {
        jobname: job.jobname(),
        partition: &resources.partition,
        mem: resources.mem,
        nproc: resources.nproc,
        time: &resources.time,
        command: job.command(),
    };
    render("single", SINGLE, &context)
}

/// Render one job array script covering the `pending` indices
///
/// Every array task gets the resources of `representative`: jobs in one batch are assumed to
/// request the same resources. Task `i` runs `{jobname}-{i}-try{try_count}.sh`, see
/// [`command_file_name`].
pub fn batch<P: Program>(
    jobname: &str,
    representative: &Job<P>,
    pending: &[usize],
    max_concurrency: u32,
    try_count: u32,
) -> Result<String> {
    /// included job array template
    static BATCH: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/batch.txt"));
    let resources: &Resources = representative.resources();
    let context = BatchContext {
        jobname,
        partition: &resources.partition,
        mem: resources.mem,
        nproc: resources.nproc,
        time: &resources.time,
        array: array_spec(pending, max_concurrency),
        task_id: TASK_ID,
        try_count,
    };
    render("batch", BATCH, &context)
}

/// Render the command file that moves into the job directory and runs the job's command
pub fn command<P: Program>(job: &Job<P>) -> Result<String> {
    /// included command template
    static COMMAND: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/command.txt"));
    let context = CommandContext { dir: job.dir().display().to_string(), command: job.command() };
    render("command", COMMAND, &context)
}

/// `--array` value: comma separated task indices, then `%` and the number of tasks allowed to
/// run at once
pub fn array_spec(pending: &[usize], max_concurrency: u32) -> String {
    let indices: Vec<String> = pending.iter().map(|index| index.to_string()).collect();
    format!("{}%{}", indices.join(","), max_concurrency)
}

pub fn command_file_name(jobname: &str, index: usize, try_count: u32) -> String {
    format!("{jobname}-{index}-try{try_count}.sh")
}

/// Write a rendered script to disk, replacing any previous version
pub fn write_script(path: &Path, content: &str, executable: bool) -> Result<()> {
    info!("Writing script to {}", path.display());
    fs::write(path, content).map_err(|err| Error::filesystem(path, err))?;

    if executable {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|err| Error::filesystem(path, err))?;
    }
    Ok(())
}

fn render<C: Serialize>(name: &str, template: &str, context: &C) -> Result<String> {
    let mut tt = TinyTemplate::new();
    // commands are shell, not HTML
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)?;
    Ok(tt.render(name, context)?)
}
