//! Submit jobs to SLURM and resubmit them until their output is free of warnings

use std::path::PathBuf;

pub mod error;
/// Interface to the program that writes inputs and reads outputs of a job
pub mod program;
/// Read and validate JSON job requests given on the command line
pub mod request;
/// Single job and job array resubmission loops
pub mod run;
/// Job descriptors, sbatch scripts and submission
pub mod slurm;

pub use error::{Error, Result};

/// Base directory that holds one subdirectory per job
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}
