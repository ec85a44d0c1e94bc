use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::{Error, Result};
use crate::program::{ArgumentDict, Program, Subject};
use crate::slurm::job_request::{JobRequest, Resources};
use crate::WorkingDirectory;

/// One submission attempt of a job
///
/// A Job is created once per try from a [`JobRequest`]. Creating it writes the input files to
/// `<working directory>/<jobname>/`, so a Job always has its inputs on disk. Nothing about a Job
/// changes after creation: [`Job::resubmit`] returns the next generation instead.
pub struct Job<P: Program> {
    jobname: String,
    try_count: u32,
    resources: Resources,
    wd: WorkingDirectory,
    dir: PathBuf,
    basename: PathBuf,
    input: Vec<String>,
    input_paths: Vec<PathBuf>,
    input_path_rel: String,
    output_path_abs: PathBuf,
    output_path_rel: String,
    command: String,
    arguments: ArgumentDict,
    program: Arc<P>,
    subject: P::Subject,
}

/// Rendering context for input and output path templates
#[derive(Serialize)]
struct PathContext<'a> {
    dir: &'a str,
    jobname: &'a str,
    try_count: u32,
}

impl<S: Subject> JobRequest<S> {
    /// Write the job's input files and resolve its command
    ///
    /// Arguments are checked before anything touches the filesystem.
    pub fn create<P>(self, wd: &WorkingDirectory, program: Arc<P>, try_count: u32) -> Result<Job<P>>
    where
        P: Program<Subject = S>,
    {
        self.check(program.as_ref())?;

        let dir = absolute(&wd.path.join(&self.jobname))?;
        let prefix = format!("{}/", dir.display());
        let infiles = program.infiles();
        let outfiles = program.outfiles();

        let input_paths = infiles
            .iter()
            .take(self.input.len())
            .map(|template| render_path(template, &prefix, &self.jobname, try_count).map(PathBuf::from))
            .collect::<Result<Vec<PathBuf>>>()?;
        let input_path_rel = render_path(&infiles[0], "", &self.jobname, try_count)?;
        let output_path_abs = PathBuf::from(render_path(&outfiles[0], &prefix, &self.jobname, try_count)?);
        let output_path_rel = render_path(&outfiles[0], "", &self.jobname, try_count)?;

        info!("Creating job {} (try {}) in working directory {}", &self.jobname, try_count, dir.display());
        fs::create_dir_all(&dir).map_err(|err| Error::filesystem(&dir, err))?;

        for (path, content) in input_paths.iter().zip(&self.input) {
            info!("Writing input to {}", path.display());
            fs::write(path, content).map_err(|err| Error::filesystem(path, err))?;
        }

        let command = self
            .command
            .replace("INPUTFILE", &input_path_rel)
            .replace("OUTPUTFILE", &output_path_rel);
        debug!("Resolved command: {command}");

        Ok(Job {
            basename: dir.join(format!("{}-try{}", self.jobname, try_count)),
            jobname: self.jobname,
            try_count,
            resources: self.resources,
            wd: wd.clone(),
            dir,
            input: self.input,
            input_paths,
            input_path_rel,
            output_path_abs,
            output_path_rel,
            command,
            arguments: self.arguments,
            program,
            subject: self.subject,
        })
    }

    fn check<P: Program>(&self, program: &P) -> Result<()> {
        if !is_plain_name(&self.jobname) {
            return Err(Error::TypeMismatch(format!("job name '{}' is not a plain directory name", self.jobname)));
        }
        if self.input.is_empty() {
            return Err(Error::TypeMismatch(format!("job {} has no input", self.jobname)));
        }
        if self.input.len() > program.infiles().len() {
            return Err(Error::TypeMismatch(format!(
                "job {} has {} inputs but the program only names {} input files",
                self.jobname,
                self.input.len(),
                program.infiles().len()
            )));
        }
        if program.outfiles().is_empty() {
            return Err(Error::TypeMismatch("the program names no output files".to_string()));
        }
        Ok(())
    }
}

impl<P: Program> Job<P> {
    /// Create the next generation of this job
    ///
    /// The program patches the arguments based on the failed subject and builds a new request,
    /// which is created in the same working directory with `try_count + 1`.
    pub fn resubmit(&self, failed: &P::Subject) -> Result<Job<P>> {
        let next_try = self.try_count + 1;
        info!("Resubmitting {} as try {} ({} warnings)", self.jobname, next_try, failed.warnings().len());
        let arguments = self.program.fix_errors(failed, &self.basename, &self.arguments)?;
        let request = self.program.resubmit(arguments, next_try)?;
        request.create(&self.wd, Arc::clone(&self.program), next_try)
    }

    pub fn jobname(&self) -> &str {
        &self.jobname
    }

    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Absolute job directory, `<working directory>/<jobname>`
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<jobname>-try<try_count>`, handed to the program when fixing errors
    pub fn basename(&self) -> &Path {
        &self.basename
    }

    pub fn input(&self) -> &[String] {
        &self.input
    }

    pub fn input_paths(&self) -> &[PathBuf] {
        &self.input_paths
    }

    pub fn input_path_rel(&self) -> &str {
        &self.input_path_rel
    }

    pub fn output_path_abs(&self) -> &Path {
        &self.output_path_abs
    }

    pub fn output_path_rel(&self) -> &str {
        &self.output_path_rel
    }

    /// Command with `INPUTFILE` and `OUTPUTFILE` replaced by relative paths
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &ArgumentDict {
        &self.arguments
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn subject(&self) -> &P::Subject {
        &self.subject
    }
}

/// Render a path template using TinyTemplate
fn render_path(template: &str, dir: &str, jobname: &str, try_count: u32) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("path", template)
        .map_err(|err| Error::TypeMismatch(format!("bad path template '{template}': {err}")))?;

    let context = PathContext { dir, jobname, try_count };
    tt.render("path", &context)
        .map_err(|err| Error::TypeMismatch(format!("can't render path template '{template}': {err}")))
}

/// A name that is usable as a single directory below the working directory
pub(crate) fn is_plain_name(name: &str) -> bool {
    !(name.is_empty() || name == "." || name == ".." || name.contains('/'))
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = match path.is_absolute() {
        true => path.to_path_buf(),
        false => env::current_dir().map_err(|err| Error::filesystem(path, err))?.join(path),
    };
    Ok(joined.components().filter(|c| !matches!(c, Component::CurDir)).collect())
}
