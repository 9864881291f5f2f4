use crate::analyzers::types::TableRow;
use crate::analyzers::utility::mean;
use crate::error::{GradeError, Result};
use crate::store::{Assignment, StudentStore};

/// Mean score for `assignment` across every student in the store.
///
/// # Errors
///
/// [`GradeError::EmptyStore`] when no students are loaded.
pub fn mean_score(store: &StudentStore, assignment: Assignment) -> Result<f64> {
    mean(store.iter().map(|s| assignment.score(s))).ok_or(GradeError::EmptyStore)
}

/// Mean score for `assignment` among students of `group`.
///
/// # Errors
///
/// [`GradeError::EmptyGroup`] when the group has no members. An empty group
/// is never reported as a mean of 0.
pub fn mean_score_for_group(
    store: &StudentStore,
    assignment: Assignment,
    group: i64,
) -> Result<f64> {
    mean(store.in_group(group).map(|s| assignment.score(s)))
        .ok_or(GradeError::EmptyGroup(group))
}

/// Report rows for `assignment`, all students or only `group`, in store order.
pub fn table_rows(
    store: &StudentStore,
    assignment: Assignment,
    group: Option<i64>,
) -> Vec<TableRow> {
    store
        .iter()
        .filter(|s| group.is_none_or(|g| s.group == g))
        .map(|s| TableRow {
            name: s.name.clone(),
            group: s.group,
            score: assignment.score(s),
        })
        .collect()
}
