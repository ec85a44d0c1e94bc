//! Job requests are JSON files naming the program configuration and the jobs to run

/// Typed request file content
pub mod job;
/// Read a request file, validate it against the schema and deserialise it
pub mod message;
/// Load the embedded JSON schema for request files
pub mod schema;
