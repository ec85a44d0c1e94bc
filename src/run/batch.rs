use std::collections::HashSet;
use std::fs;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::program::{Attempt, Program, Subject};
use crate::run::RetryPolicy;
use crate::slurm::job::{absolute, is_plain_name, Job};
use crate::slurm::script;
use crate::slurm::submit::Scheduler;
use crate::WorkingDirectory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// name of the job array, also the directory holding its scripts
    pub jobname: String,
    /// maximum number of array tasks running at once
    pub max_concurrency: u32,
    pub policy: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions { jobname: "batch_job".to_string(), max_concurrency: 50, policy: RetryPolicy::default() }
    }
}

/// Run `jobs` as a SLURM job array, resubmitting the jobs that come back with warnings
///
/// Each generation is one array submission covering only the jobs that still need a run. All
/// jobs share one generation counter, which names the command files
/// (`<jobname>-<index>-try<generation>.sh`), while each job's descriptor advances through its
/// own resubmissions. Every task gets the resources of the first job.
///
/// The result has one slot per job, in input order. With `ignore_exhaustion` set, slots of jobs
/// that never succeeded hold their last (failing) subject, or `None` if they never ran.
pub fn run_batch<P, S>(
    jobs: Vec<Job<P>>,
    options: &BatchOptions,
    wd: &WorkingDirectory,
    scheduler: &S,
) -> Result<Vec<Option<P::Subject>>>
where
    P: Program,
    S: Scheduler,
{
    if !is_plain_name(&options.jobname) {
        return Err(Error::TypeMismatch(format!("batch name '{}' is not a plain directory name", options.jobname)));
    }
    if options.max_concurrency == 0 {
        return Err(Error::TypeMismatch("at least one array task must be allowed to run".to_string()));
    }
    let mut dirs = HashSet::new();
    if let Some(job) = jobs.iter().find(|job| !dirs.insert(job.dir())) {
        return Err(Error::TypeMismatch(format!("more than one job in batch {} uses {}", options.jobname, job.dir().display())));
    }
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let batch_dir = absolute(&wd.path.join(&options.jobname))?;
    info!("Creating batch {} with {} jobs in {}", options.jobname, jobs.len(), batch_dir.display());
    fs::create_dir_all(&batch_dir).map_err(|err| Error::filesystem(&batch_dir, err))?;

    let mut jobs = jobs;
    let mut results: Vec<Attempt<P::Subject>> = jobs.iter().map(|_| Attempt::NotYetAttempted).collect();
    let mut pending: Vec<usize> = (0..jobs.len()).collect();
    let mut try_count: u32 = 0;

    while !pending.is_empty() {
        if try_count >= options.policy.tries {
            warn!("Ran out of resubmission tries for batch {}, {} jobs unfinished", options.jobname, pending.len());
            return match options.policy.ignore_exhaustion {
                true => Ok(into_results(results)),
                false => Err(Error::RetriesExhausted { jobname: options.jobname.clone(), tries: options.policy.tries }),
            };
        }

        let sbatch_path = batch_dir.join(format!("{}.sbatch", options.jobname));
        let array = script::batch(&options.jobname, &jobs[0], &pending, options.max_concurrency, try_count)?;
        script::write_script(&sbatch_path, &array, false)?;
        for &index in &pending {
            let command_path = batch_dir.join(script::command_file_name(&options.jobname, index, try_count));
            script::write_script(&command_path, &script::command(&jobs[index])?, true)?;
        }

        info!("Submitting batch {} generation {} ({} jobs)", options.jobname, try_count, pending.len());
        let run_id = scheduler.submit(&sbatch_path, &batch_dir)?;

        let mut next_pending = Vec::new();
        for index in pending {
            let scheduler_log = batch_dir.join(format!("{}-{}_{}.out", options.jobname, run_id, index));
            let job = &jobs[index];
            let subject = job.program().read_output(job, &scheduler_log)?;

            if !subject.warnings().is_empty() {
                let next = job.resubmit(&subject)?;
                jobs[index] = next;
                next_pending.push(index);
            }
            results[index] = Attempt::Evaluated(subject);
        }

        info!("Batch {} generation {}: {} jobs need resubmission", options.jobname, try_count, next_pending.len());
        pending = next_pending;
        try_count += 1;
    }

    Ok(into_results(results))
}

fn into_results<S: Subject>(results: Vec<Attempt<S>>) -> Vec<Option<S>> {
    results
        .into_iter()
        .map(|attempt| match attempt {
            Attempt::Evaluated(subject) => Some(subject),
            Attempt::NotYetAttempted => None,
        })
        .collect()
}
