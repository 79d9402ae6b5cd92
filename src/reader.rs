//! Boundary contract for external data loaders.
//!
//! The core performs no file I/O; a collaborator implementing
//! [`DataReader`] materializes variables into [`SourceData`] and its
//! errors are surfaced unchanged. [`read_with_context`] only adds the
//! call context (variable, files) to the log.

use std::path::Path;

use thiserror::Error;

use crate::SourceData;

/// Errors an I/O collaborator may produce; never retried.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("variable \"{0}\" not found")]
    VariableNotFound(String),
    #[error("{0}")]
    Format(String),
}

/// Reads one variable, concatenated over `paths`, into a gridded or
/// ungridded container satisfying the data model invariants.
pub trait DataReader {
    fn read_data(
        &self,
        paths: &[&Path],
        variable: &str,
        product: Option<&str>,
    ) -> Result<SourceData, ReadError>;
}

/// Read a variable, logging the call context on failure. The error is
/// passed through unchanged.
pub fn read_with_context<R: DataReader + ?Sized>(
    reader: &R,
    paths: &[&Path],
    variable: &str,
    product: Option<&str>,
) -> Result<SourceData, ReadError> {
    tracing::info!(variable, "reading data");
    reader.read_data(paths, variable, product).map_err(|err| {
        tracing::error!(variable, ?paths, %err, "there was an error reading in data");
        err
    })
}
