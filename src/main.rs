use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;

use sbatch_retry::program::scan::OutputScan;
use sbatch_retry::request::message::Message;
use sbatch_retry::request::schema::load_schema;
use sbatch_retry::run::{run, run_batch, BatchOptions, RetryPolicy};
use sbatch_retry::slurm::job::Job;
use sbatch_retry::slurm::submit::Sbatch;
use sbatch_retry::{Error, WorkingDirectory};

/// Submit jobs to SLURM and resubmit them until their output is clean
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory that gets one subdirectory per job
    #[arg(short, long, default_value = ".")]
    work_dir: PathBuf,

    /// sbatch executable
    #[arg(long, default_value = "sbatch")]
    sbatch: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit the single job in a request file
    Run {
        /// Path to a JSON job request
        #[arg(short, long)]
        request: PathBuf,

        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Submit every job in a request file as one job array
    Batch {
        /// Path to a JSON job request
        #[arg(short, long)]
        request: PathBuf,

        /// Name of the job array and of the directory holding its scripts
        #[arg(long, default_value = "batch_job")]
        jobname: String,

        /// Maximum number of array tasks running at once
        #[arg(long, default_value_t = 50)]
        max: u32,

        #[command(flatten)]
        retry: RetryArgs,
    },
}

#[derive(Args, Debug)]
struct RetryArgs {
    /// Number of submissions before giving up
    #[arg(long, default_value_t = 1)]
    tries: u32,

    /// Print the last results instead of failing when tries run out
    #[arg(long)]
    ignore: bool,
}

impl From<&RetryArgs> for RetryPolicy {
    fn from(args: &RetryArgs) -> Self {
        RetryPolicy { tries: args.tries, ignore_exhaustion: args.ignore }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    info!("starting up");

    let cli = Cli::parse();
    let wd = WorkingDirectory { path: cli.work_dir.clone() };
    let scheduler = Sbatch { program: cli.sbatch.clone() };

    match &cli.command {
        Commands::Run { request, retry } => {
            let mut jobs = create_jobs(request, &wd)?;
            if jobs.len() != 1 {
                bail!(Error::TypeMismatch(format!("run expects exactly one job, {} has {}", request.display(), jobs.len())));
            }
            let job = jobs.remove(0);
            let record = run(job, &scheduler, RetryPolicy::from(retry))?;
            print_json(&record)
        }
        Commands::Batch { request, jobname, max, retry } => {
            let jobs = create_jobs(request, &wd)?;
            let options = BatchOptions { jobname: jobname.clone(), max_concurrency: *max, policy: RetryPolicy::from(retry) };
            let records = run_batch(jobs, &options, &wd, &scheduler)?;
            print_json(&records)
        }
    }
}

/// Read the request file and create the first generation of every job in it
fn create_jobs(request: &Path, wd: &WorkingDirectory) -> Result<Vec<Job<OutputScan>>> {
    let message = Message { path: request.to_path_buf(), compiled_schema: load_schema()? };
    let request = message.read()?;
    let program = Arc::new(OutputScan::new(request.program));

    request
        .jobs
        .into_iter()
        .map(|entry| {
            let jobname = entry.jobname.clone();
            let job_request = program.request(entry)?;
            job_request
                .create(wd, Arc::clone(&program), 0)
                .with_context(|| format!("Can't create job {jobname}"))
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
