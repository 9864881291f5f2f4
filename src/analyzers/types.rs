//! Result types produced by the aggregation engine.

use serde::Serialize;

/// One line of the course table report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub name: String,
    pub group: i64,
    pub score: i64,
}
