//! Fatal pipeline conditions.
//!
//! Everything else in the crate propagates `anyhow::Error`. The conditions
//! below are the ones a caller must be able to tell apart (the CLI maps each
//! to its own exit code), so they travel as a typed error inside `anyhow`
//! and are recovered with `downcast_ref`.

use thiserror::Error;

/// A run-terminating condition detected by the unifier pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnifyError {
    /// DISCOVER found no candidate file under any input directory.
    #[error("discover: no CSV/JSON/SQLite files found under the input directories")]
    NoInputFiles,

    /// Files were found but nothing usable came out of LOAD / NORMALIZE_SCHEMA.
    #[error("load: {files} file(s) discovered but no listing could be loaded")]
    NoRecords { files: usize },

    /// Every listing was excluded by the brand/size/model filters.
    #[error("filter: no listing survives the filters ({filters}); adjust --only-brand/--only-size/--only-model")]
    FilteredOut { filters: String },

    /// `--split-by` names an unknown attribute or the output is not a directory.
    #[error("partition: {0}")]
    InvalidPartition(String),
}

impl UnifyError {
    /// Process exit code reported by the CLI for this condition.
    pub fn exit_code(&self) -> i32 {
        match self {
            UnifyError::NoInputFiles | UnifyError::NoRecords { .. } => 2,
            UnifyError::FilteredOut { .. } => 3,
            UnifyError::InvalidPartition(_) => 4,
        }
    }
}

/// Exit code for any error: typed conditions get their own code, the rest 1.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<UnifyError>()
        .map(UnifyError::exit_code)
        .unwrap_or(1)
}
