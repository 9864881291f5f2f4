//! CSV parsing for score sheets.
//!
//! Each sheet has a header row. Columns are located by name so their order
//! does not matter and extra columns are ignored.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::error::{GradeError, Result};

/// One row of a homework sheet after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    pub student_id: i64,
    pub name: String,
    pub group: i64,
    pub score: i64,
}

/// One row of the exam sheet after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamRow {
    pub student_id: i64,
    pub exam: i64,
}

/// Reads a homework sheet whose score lives in `score_column`.
///
/// # Errors
///
/// [`GradeError::SourceNotFound`] if the file cannot be opened and
/// [`GradeError::MalformedRow`] for a missing column or a non-integer field.
pub fn read_score_sheet(path: &Path, score_column: &str) -> Result<Vec<ScoreRow>> {
    let (sheet, mut reader) = Sheet::open(path)?;
    let id_idx = sheet.column("student_id")?;
    let name_idx = sheet.column("name")?;
    let group_idx = sheet.column("group")?;
    let score_idx = sheet.column(score_column)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| sheet.csv_error(e))?;
        let line = line_of(&record);

        let student_id = sheet.required_int(&record, id_idx, "student_id", line)?;
        // a blank name is kept as-is; only the column itself is required
        let name = record.get(name_idx).unwrap_or("").to_string();
        let group = sheet.required_int(&record, group_idx, "group", line)?;
        let score = sheet.optional_int(&record, score_idx, score_column, line)?;

        rows.push(ScoreRow {
            student_id,
            name,
            group,
            score,
        });
    }

    debug!(path = %path.display(), rows = rows.len(), column = score_column, "Score sheet parsed");
    Ok(rows)
}

/// Reads the exam sheet (`student_id`, `exam`).
pub fn read_exam_sheet(path: &Path) -> Result<Vec<ExamRow>> {
    let (sheet, mut reader) = Sheet::open(path)?;
    let id_idx = sheet.column("student_id")?;
    let exam_idx = sheet.column("exam")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| sheet.csv_error(e))?;
        let line = line_of(&record);
        rows.push(ExamRow {
            student_id: sheet.required_int(&record, id_idx, "student_id", line)?,
            exam: sheet.optional_int(&record, exam_idx, "exam", line)?,
        });
    }

    debug!(path = %path.display(), rows = rows.len(), "Exam sheet parsed");
    Ok(rows)
}

/// Parses an integer cell. Spreadsheet exports often write whole numbers as
/// `80.0`, so a float with no fractional part is accepted as well.
pub fn parse_int(field: &str) -> Option<i64> {
    let field = field.trim();
    if let Ok(v) = field.parse::<i64>() {
        return Some(v);
    }
    let f = field.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

struct Sheet<'a> {
    path: &'a Path,
    headers: StringRecord,
}

impl<'a> Sheet<'a> {
    fn open(path: &'a Path) -> Result<(Self, csv::Reader<File>)> {
        let file = File::open(path).map_err(|source| GradeError::SourceNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        // flexible: a short row means the trailing score cell is absent
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(file);

        let headers = reader.headers().map_err(|e| GradeError::MalformedRow {
            path: path.to_path_buf(),
            line: 1,
            reason: e.to_string(),
        })?;
        let headers = headers.clone();

        Ok((Self { path, headers }, reader))
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| self.malformed(1, &format!("missing column `{name}`")))
    }

    fn required_int(
        &self,
        record: &StringRecord,
        idx: usize,
        column: &str,
        line: u64,
    ) -> Result<i64> {
        let raw = record.get(idx).unwrap_or("");
        parse_int(raw)
            .ok_or_else(|| self.malformed(line, &format!("`{column}` is not an integer: {raw:?}")))
    }

    fn optional_int(
        &self,
        record: &StringRecord,
        idx: usize,
        column: &str,
        line: u64,
    ) -> Result<i64> {
        match record.get(idx) {
            None | Some("") => Ok(0),
            Some(raw) => parse_int(raw).ok_or_else(|| {
                self.malformed(line, &format!("`{column}` is not an integer: {raw:?}"))
            }),
        }
    }

    fn malformed(&self, line: u64, reason: &str) -> GradeError {
        GradeError::MalformedRow {
            path: self.path.to_path_buf(),
            line,
            reason: reason.to_string(),
        }
    }

    fn csv_error(&self, e: csv::Error) -> GradeError {
        let line = e.position().map(|p| p.line()).unwrap_or(0);
        self.malformed(line, &e.to_string())
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}
