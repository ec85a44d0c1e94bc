use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::request::job::RunRequest;

/// A request file on disk and the schema it must satisfy
pub struct Message {
    pub path: PathBuf,
    pub compiled_schema: JSONSchema,
}

impl Message {
    pub fn read(&self) -> Result<RunRequest> {
        let json: Value = self.parse_untyped_json()?;

        match self.validate(&json) {
            Ok(_) => {
                info!("Request is valid");
                self.parse_json(json)
            }
            Err(err) => {
                warn!("Request fails validation");
                Err(err)
            }
        }
    }

    fn validate(&self, json: &Value) -> Result<()> {
        info!("Validating request against JSON schema");
        self.compiled_schema.validate(json).map_err(|errors| {
            let reasons: Vec<String> = errors.map(|err| format!("{} at '{}'", err, err.instance_path)).collect();
            Error::TypeMismatch(format!("{} doesn't match the request schema: {}", self.path.display(), reasons.join("; ")))
        })
    }

    fn read_file(&self) -> Result<String> {
        let path: &Path = self.path.as_path();
        info!("Reading request at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            warn!("Can't read request at path {}: {}", path.display(), err);
            Error::filesystem(path, err)
        })
    }

    fn parse_json(&self, value: Value) -> Result<RunRequest> {
        info!("Deserialising valid JSON into typed request");
        let request = serde_json::from_value::<RunRequest>(value)
            .map_err(|err| Error::TypeMismatch(format!("can't deserialise {}: {}", self.path.display(), err)))?;
        self.check_jobnames(&request)?;
        Ok(request)
    }

    /// Job names pick the job directories, so no two jobs may share one
    fn check_jobnames(&self, request: &RunRequest) -> Result<()> {
        let mut seen = HashSet::new();
        match request.jobs.iter().find(|job| !seen.insert(job.jobname.as_str())) {
            Some(job) => Err(Error::TypeMismatch(format!(
                "{} names job {} more than once",
                self.path.display(),
                job.jobname
            ))),
            None => Ok(()),
        }
    }

    fn parse_untyped_json(&self) -> Result<Value> {
        let json_string = self.read_file()?;
        serde_json::from_str::<Value>(&json_string)
            .map_err(|err| Error::TypeMismatch(format!("{} isn't valid JSON: {}", self.path.display(), err)))
    }
}
