//! Error taxonomy for loading sources and answering queries.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradeError {
    #[error("source not found: {path}: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row in {path} at line {line}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("Invalid homework name: {0}")]
    UnknownAssignment(String),

    #[error("No students in group {0}")]
    EmptyGroup(i64),

    #[error("No students loaded")]
    EmptyStore,

    #[error("Student not found: {0}")]
    StudentNotFound(i64),

    #[error("Missing parameters: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {name}: {value:?} is not an integer")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Invalid exam score: {0}")]
    InvalidScore(i64),
}

impl GradeError {
    /// True for failures that happen while building a store rather than while
    /// answering a query against one.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            GradeError::SourceNotFound { .. } | GradeError::MalformedRow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GradeError>;
