//! Query entry points used by the HTTP layer.
//!
//! Each function takes raw request inputs, validates them, runs the matching
//! aggregation and returns a [`Reply`]. Query failures are turned into a
//! `400 {"error": ...}` body here and never escape as panics or `Err`.

use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::analyzers::{self, TableRow};
use crate::error::{GradeError, Result};
use crate::parser::parse_int;
use crate::store::{Assignment, SharedStore, Snapshot};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_SERVER_ERROR: u16 = 500;

/// A response body together with its HTTP status code.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: STATUS_OK,
            body,
        }
    }

    pub fn error(err: &GradeError) -> Self {
        Self {
            status: status_for(err),
            body: json!({ "error": err.to_string() }),
        }
    }

    /// A 400 for input that could not even be read, before any validation.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl From<Result<Value>> for Reply {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(body) => Reply::ok(body),
            Err(e) => {
                debug!(error = %e, "Query rejected");
                Reply::error(&e)
            }
        }
    }
}

/// Load failures are the server's fault; everything else is the caller's.
pub fn status_for(err: &GradeError) -> u16 {
    if err.is_load_error() {
        STATUS_SERVER_ERROR
    } else {
        STATUS_BAD_REQUEST
    }
}

/// Rows for the course table report, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseTable {
    pub assignment: Assignment,
    pub group: Option<i64>,
    pub rows: Vec<TableRow>,
}

pub fn names(snapshot: &Snapshot) -> Reply {
    let names: Vec<&str> = snapshot.store.iter().map(|s| s.name.as_str()).collect();
    Reply::ok(json!({ "names": names }))
}

pub fn health(snapshot: &Snapshot) -> Reply {
    Reply::ok(json!({
        "students": snapshot.summary.students,
        "groups": snapshot.summary.groups,
        "loaded_at": snapshot.loaded_at,
    }))
}

/// `/{hw}/mean_score`
pub fn mean_score(snapshot: &Snapshot, hw: &str) -> Reply {
    let result = hw.parse::<Assignment>().and_then(|assignment| {
        let mean = analyzers::mean_score(&snapshot.store, assignment)?;
        Ok(json!({ "mean_score": mean }))
    });
    result.into()
}

/// `/{hw}/{group}/mean_score`
pub fn mean_score_for_group(snapshot: &Snapshot, hw: &str, group: &str) -> Reply {
    group_mean(snapshot, Some(hw), Some(group)).into()
}

/// `/mean_score?hw_name=..&group_id=..`
pub fn query_mean_score(
    snapshot: &Snapshot,
    hw_name: Option<&str>,
    group_id: Option<&str>,
) -> Reply {
    group_mean(snapshot, hw_name, group_id).into()
}

fn group_mean(snapshot: &Snapshot, hw: Option<&str>, group: Option<&str>) -> Result<Value> {
    let hw = require(hw, "hw_name")?;
    let group = require(group, "group_id")?;
    let assignment = hw.parse::<Assignment>()?;
    let group = int_param("group_id", group)?;

    let mean = analyzers::mean_score_for_group(&snapshot.store, assignment, group)?;
    Ok(json!({ "mean_score": mean }))
}

/// `/mark?student_id=..` or `/mark?group_id=..`. `student_id` wins when
/// both are given.
pub fn mark(snapshot: &Snapshot, student_id: Option<&str>, group_id: Option<&str>) -> Reply {
    let result = match (present(student_id), present(group_id)) {
        (Some(raw), _) => int_param("student_id", raw).and_then(|id| {
            let mark = analyzers::mark_for(&snapshot.store, id)?;
            Ok(json!({ "mark": mark }))
        }),
        (None, Some(raw)) => int_param("group_id", raw).and_then(|group| {
            let average = analyzers::average_mark_for_group(&snapshot.store, group)?;
            Ok(json!({ "average_mark": average }))
        }),
        (None, None) => Err(GradeError::MissingParameter("student_id or group_id")),
    };
    result.into()
}

/// `/course_table?hw_name=..[&group_id=..]`
pub fn course_table(
    snapshot: &Snapshot,
    hw_name: Option<&str>,
    group_id: Option<&str>,
) -> std::result::Result<CourseTable, Reply> {
    let build = || -> Result<CourseTable> {
        let assignment = require(hw_name, "hw_name")?.parse::<Assignment>()?;
        let group = present(group_id)
            .map(|raw| int_param("group_id", raw))
            .transpose()?;
        let rows = analyzers::table_rows(&snapshot.store, assignment, group);
        Ok(CourseTable {
            assignment,
            group,
            rows,
        })
    };

    build().map_err(|e| {
        debug!(error = %e, "Course table rejected");
        Reply::error(&e)
    })
}

/// Re-reads the sources and swaps in the new snapshot.
pub fn reload(shared: &SharedStore) -> Reply {
    match shared.reload() {
        Ok(snapshot) => {
            info!(students = snapshot.summary.students, "Snapshot reloaded");
            Reply::ok(json!({
                "students": snapshot.summary.students,
                "loaded_at": snapshot.loaded_at,
            }))
        }
        Err(e) => {
            error!(error = %e, "Reload failed, keeping current snapshot");
            Reply::error(&e)
        }
    }
}

/// Empty query values count as absent.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.filter(|v| !v.trim().is_empty())
}

fn require<'a>(raw: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    present(raw).ok_or(GradeError::MissingParameter(name))
}

fn int_param(name: &'static str, raw: &str) -> Result<i64> {
    parse_int(raw).ok_or_else(|| GradeError::InvalidParameter {
        name,
        value: raw.to_string(),
    })
}
