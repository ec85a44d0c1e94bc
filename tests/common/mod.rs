#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sbatch_retry::program::{ArgumentDict, Program, Subject};
use sbatch_retry::slurm::job::Job;
use sbatch_retry::slurm::job_request::{JobRequest, Resources};
use sbatch_retry::slurm::submit::{RunId, Scheduler};
use sbatch_retry::{Error, Result, WorkingDirectory};
use serde_json::json;

pub const NOT_CONVERGED: &str = "geometry not converged";

#[derive(Debug, Clone)]
pub struct Molecule {
    pub name: String,
    pub warnings: Vec<String>,
}

impl Subject for Molecule {
    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// One call to `read_output`
#[derive(Debug, Clone)]
pub struct Read {
    pub jobname: String,
    pub try_count: u32,
    pub scheduler_log: PathBuf,
}

/// A program whose jobs converge on a fixed submission number
pub struct Converging {
    infiles: Vec<String>,
    outfiles: Vec<String>,
    /// submission (1-based) on which each job first comes back clean; absent jobs never do
    succeeds_on: HashMap<String, u32>,
    pub reads: RefCell<Vec<Read>>,
    pub fixed: RefCell<Vec<PathBuf>>,
}

impl Converging {
    pub fn new(succeeds_on: &[(&str, u32)]) -> Arc<Self> {
        Arc::new(Converging {
            infiles: vec!["{dir}{jobname}-try{try_count}.inp".to_string()],
            outfiles: vec!["{dir}{jobname}-try{try_count}.log".to_string()],
            succeeds_on: succeeds_on.iter().map(|(name, n)| (name.to_string(), *n)).collect(),
            reads: RefCell::new(Vec::new()),
            fixed: RefCell::new(Vec::new()),
        })
    }

    pub fn request(&self, jobname: &str, arguments: ArgumentDict, try_count: u32) -> JobRequest<Molecule> {
        JobRequest {
            jobname: jobname.to_string(),
            input: vec![format!("opt geometry, step {try_count}")],
            command: "optimise INPUTFILE > OUTPUTFILE".to_string(),
            resources: Resources { nproc: 2, mem: 4, time: "00:10:00".to_string(), partition: "debug".to_string() },
            subject: Molecule { name: jobname.to_string(), warnings: Vec::new() },
            arguments,
        }
    }

    pub fn reads_of(&self, jobname: &str) -> Vec<Read> {
        self.reads.borrow().iter().filter(|read| read.jobname == jobname).cloned().collect()
    }
}

impl Program for Converging {
    type Subject = Molecule;

    fn infiles(&self) -> &[String] {
        &self.infiles
    }

    fn outfiles(&self) -> &[String] {
        &self.outfiles
    }

    fn read_output(&self, job: &Job<Self>, scheduler_log: &Path) -> anyhow::Result<Molecule> {
        self.reads.borrow_mut().push(Read {
            jobname: job.jobname().to_string(),
            try_count: job.try_count(),
            scheduler_log: scheduler_log.to_path_buf(),
        });
        let submissions = self.reads_of(job.jobname()).len() as u32;
        let clean = self.succeeds_on.get(job.jobname()).map_or(false, |&n| submissions >= n);

        Ok(Molecule {
            name: job.jobname().to_string(),
            warnings: if clean { Vec::new() } else { vec![NOT_CONVERGED.to_string()] },
        })
    }

    fn fix_errors(&self, _failed: &Molecule, basename: &Path, arguments: &ArgumentDict) -> anyhow::Result<ArgumentDict> {
        self.fixed.borrow_mut().push(basename.to_path_buf());
        let mut arguments = arguments.clone();
        let fixes = arguments.get("fixes").and_then(|v| v.as_u64()).unwrap_or(0);
        arguments.insert("fixes".to_string(), json!(fixes + 1));
        Ok(arguments)
    }

    fn resubmit(&self, arguments: ArgumentDict, try_count: u32) -> anyhow::Result<JobRequest<Molecule>> {
        let jobname = arguments
            .get("jobname")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("no jobname"))?
            .to_string();
        Ok(self.request(&jobname, arguments, try_count))
    }
}

/// A working directory given relative to the current directory, removed on drop
pub fn relative_working_directory() -> (tempfile::TempDir, WorkingDirectory) {
    let tmp = tempfile::TempDir::new_in(".").unwrap();
    let wd = WorkingDirectory { path: tmp.path().to_path_buf() };
    assert!(wd.path.is_relative());
    (tmp, wd)
}

/// Absolute form of a path below a relative working directory
pub fn resolved(tmp: &tempfile::TempDir, name: &str) -> PathBuf {
    std::env::current_dir().unwrap().join(tmp.path().file_name().unwrap()).join(name)
}

/// Create the first generation of `jobname`
pub fn job(program: &Arc<Converging>, wd: &WorkingDirectory, jobname: &str) -> Job<Converging> {
    let mut arguments = ArgumentDict::new();
    arguments.insert("jobname".to_string(), json!(jobname));
    program.request(jobname, arguments, 0).create(wd, Arc::clone(program), 0).unwrap()
}

/// A submitted script, as the scheduler saw it
#[derive(Debug, Clone)]
pub struct Submission {
    pub script_path: PathBuf,
    pub script: String,
    pub working_dir: PathBuf,
    pub run_id: RunId,
}

/// Accepts every script and hands out increasing job ids, starting at 1000
///
/// Like sbatch, a relative script path is looked up from the working directory.
pub struct RecordingScheduler {
    next_id: Cell<u32>,
    pub submissions: RefCell<Vec<Submission>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        RecordingScheduler { next_id: Cell::new(1000), submissions: RefCell::new(Vec::new()) }
    }

    pub fn count(&self) -> usize {
        self.submissions.borrow().len()
    }
}

impl Scheduler for RecordingScheduler {
    fn submit(&self, script: &Path, working_dir: &Path) -> Result<RunId> {
        let resolved = working_dir.join(script);
        let content = fs::read_to_string(&resolved).map_err(|err| Error::filesystem(&resolved, err))?;
        let run_id = RunId::new(self.next_id.get().to_string());
        self.next_id.set(self.next_id.get() + 1);

        self.submissions.borrow_mut().push(Submission {
            script_path: script.to_path_buf(),
            script: content,
            working_dir: working_dir.to_path_buf(),
            run_id: run_id.clone(),
        });
        Ok(run_id)
    }
}

/// A scheduler that's down
pub struct RejectingScheduler;

impl Scheduler for RejectingScheduler {
    fn submit(&self, _script: &Path, _working_dir: &Path) -> Result<RunId> {
        Err(Error::Submission("sbatch: error: Batch job submission failed".to_string()))
    }
}
