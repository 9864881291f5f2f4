use crate::analyzers::utility::mean;
use crate::error::{GradeError, Result};
use crate::store::StudentStore;

/// Converts an exam score into a mark.
///
/// | Score     | Mark |
/// |-----------|------|
/// | 0         | 2    |
/// | 1 ..= 50  | 4    |
/// | > 50      | 5    |
///
/// # Errors
///
/// Negative scores are rejected with [`GradeError::InvalidScore`].
pub fn mark(exam_score: i64) -> Result<u8> {
    match exam_score {
        0 => Ok(2),
        1..=50 => Ok(4),
        s if s > 50 => Ok(5),
        s => Err(GradeError::InvalidScore(s)),
    }
}

/// Mark for one student's exam.
pub fn mark_for(store: &StudentStore, student_id: i64) -> Result<u8> {
    let student = store
        .get(student_id)
        .ok_or(GradeError::StudentNotFound(student_id))?;
    mark(student.exam)
}

/// Average mark across the members of `group`.
///
/// # Errors
///
/// [`GradeError::EmptyGroup`] for a group with no members, or
/// [`GradeError::InvalidScore`] if any member holds a negative exam score.
pub fn average_mark_for_group(store: &StudentStore, group: i64) -> Result<f64> {
    let marks = store
        .in_group(group)
        .map(|s| mark(s.exam).map(i64::from))
        .collect::<Result<Vec<_>>>()?;
    mean(marks).ok_or(GradeError::EmptyGroup(group))
}
