use log::{info, warn};

use crate::error::{Error, Result};
use crate::program::{Attempt, Program, Subject};
use crate::run::RetryPolicy;
use crate::slurm::job::Job;
use crate::slurm::script;
use crate::slurm::submit::{RunId, Scheduler};

/// Where a single job is in its submit, evaluate, resubmit cycle
enum State<P: Program> {
    NeedsSubmission(Job<P>, Attempt<P::Subject>),
    Submitted(Job<P>, RunId),
    Evaluated(Job<P>, P::Subject),
    Succeeded(P::Subject),
    ExhaustedRetries(Job<P>, Attempt<P::Subject>),
}

/// Submit `job` and resubmit it until its output has no warnings
///
/// A job is submitted while its `try_count` is below `policy.tries`. Once the budget is spent the
/// last evaluated subject is returned if `policy.ignore_exhaustion` is set, otherwise the run
/// fails with [`Error::RetriesExhausted`].
pub fn run<P, S>(job: Job<P>, scheduler: &S, policy: RetryPolicy) -> Result<P::Subject>
where
    P: Program,
    S: Scheduler,
{
    let mut state = State::NeedsSubmission(job, Attempt::NotYetAttempted);

    loop {
        state = match state {
            State::NeedsSubmission(job, attempt) => match job.try_count() < policy.tries {
                true => {
                    let run_id = submit(&job, scheduler)?;
                    State::Submitted(job, run_id)
                }
                false => State::ExhaustedRetries(job, attempt),
            },
            State::Submitted(job, run_id) => {
                let scheduler_log = job.dir().join(format!("{}-{}.out", job.jobname(), run_id));
                let subject = job.program().read_output(&job, &scheduler_log)?;
                State::Evaluated(job, subject)
            }
            State::Evaluated(job, subject) => match subject.warnings().is_empty() {
                true => State::Succeeded(subject),
                false => {
                    let next = job.resubmit(&subject)?;
                    State::NeedsSubmission(next, Attempt::Evaluated(subject))
                }
            },
            State::Succeeded(subject) => {
                info!("Job finished without warnings");
                return Ok(subject);
            }
            State::ExhaustedRetries(job, attempt) => {
                warn!("Ran out of resubmission tries for {} ({} tries)", job.jobname(), policy.tries);
                if !policy.ignore_exhaustion {
                    return Err(Error::RetriesExhausted { jobname: job.jobname().to_string(), tries: policy.tries });
                }
                return Ok(match attempt {
                    Attempt::Evaluated(subject) => subject,
                    Attempt::NotYetAttempted => job.subject().clone(),
                });
            }
        };
    }
}

/// Write `<jobname>-try<n>.sbatch` into the job directory and submit it from there
fn submit<P: Program, S: Scheduler>(job: &Job<P>, scheduler: &S) -> Result<RunId> {
    let sbatch_path = job.dir().join(format!("{}-try{}.sbatch", job.jobname(), job.try_count()));
    script::write_script(&sbatch_path, &script::single(job)?, false)?;

    info!("Submitting {} try {}", job.jobname(), job.try_count());
    scheduler.submit(&sbatch_path, job.dir())
}
