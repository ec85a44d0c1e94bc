use anyhow::{anyhow, Result};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

/// Compile the request schema that's included in the binary
pub fn load_schema() -> Result<JSONSchema> {
    /// included request schema
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/request.json"));
    let schema: Value = serde_json::from_str(SCHEMA)?;
    compile_schema(&schema)
}

fn compile_schema(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|err| anyhow!("Invalid request schema: {err}"))
}
