//! Create job descriptors, render them into sbatch scripts and submit them

/// Inputs needed to create a job: name, input contents, command, resources
pub mod job_request;

/// Job descriptors: one submission attempt with its files written to disk
pub mod job;

/// Render sbatch scripts with TinyTemplate
pub mod script;

/// Run sbatch and read back the job id
pub mod submit;
