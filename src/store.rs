//! The merged student set and the shared handle that serves it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{GradeError, Result};
use crate::parser::{ExamRow, ScoreRow, read_exam_sheet, read_score_sheet};
use crate::stats::StoreSummary;

/// A tracked homework assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Assignment {
    #[serde(rename = "hw-01")]
    Hw01,
    #[serde(rename = "hw-02")]
    Hw02,
}

impl Assignment {
    pub const ALL: [Assignment; 2] = [Assignment::Hw01, Assignment::Hw02];

    /// Column header (and URL segment) naming this assignment.
    pub fn name(self) -> &'static str {
        match self {
            Assignment::Hw01 => "hw-01",
            Assignment::Hw02 => "hw-02",
        }
    }

    pub fn score(self, student: &Student) -> i64 {
        match self {
            Assignment::Hw01 => student.hw_01,
            Assignment::Hw02 => student.hw_02,
        }
    }

    fn score_mut(self, student: &mut Student) -> &mut i64 {
        match self {
            Assignment::Hw01 => &mut student.hw_01,
            Assignment::Hw02 => &mut student.hw_02,
        }
    }
}

impl FromStr for Assignment {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        Assignment::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| GradeError::UnknownAssignment(s.to_string()))
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub student_id: i64,
    pub name: String,
    pub group: i64,
    pub hw_01: i64,
    pub hw_02: i64,
    pub exam: i64,
}

impl Student {
    pub fn new(student_id: i64, name: impl Into<String>, group: i64) -> Self {
        Self {
            student_id,
            name: name.into(),
            group,
            hw_01: 0,
            hw_02: 0,
            exam: 0,
        }
    }
}

/// Students keyed by id, iterated in insertion order.
#[derive(Debug, Default, Clone)]
pub struct StudentStore {
    students: Vec<Student>,
    index: HashMap<i64, usize>,
}

impl StudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the two homework sheets: every `hw-01` row first, then the
    /// `hw-02` rows, which only fill in `hw_02` for ids already present.
    pub fn from_sheets(hw01: &[ScoreRow], hw02: &[ScoreRow]) -> Self {
        let mut store = Self::new();
        for row in hw01 {
            store.merge_row(Assignment::Hw01, row);
        }
        for row in hw02 {
            store.merge_row(Assignment::Hw02, row);
        }
        store
    }

    /// Creates the student if the id is new, then sets the row's score.
    /// An existing record keeps its name and group.
    pub fn merge_row(&mut self, assignment: Assignment, row: &ScoreRow) {
        let idx = match self.index.get(&row.student_id) {
            Some(&idx) => idx,
            None => {
                self.students
                    .push(Student::new(row.student_id, row.name.clone(), row.group));
                let idx = self.students.len() - 1;
                self.index.insert(row.student_id, idx);
                idx
            }
        };
        *assignment.score_mut(&mut self.students[idx]) = row.score;
    }

    /// Fills in exam scores. Returns the ids that matched no student.
    pub fn apply_exams(&mut self, rows: &[ExamRow]) -> Vec<i64> {
        let mut unknown = Vec::new();
        for row in rows {
            match self.index.get(&row.student_id) {
                Some(&idx) => self.students[idx].exam = row.exam,
                None => unknown.push(row.student_id),
            }
        }
        unknown
    }

    pub fn get(&self, student_id: i64) -> Option<&Student> {
        self.index.get(&student_id).map(|&idx| &self.students[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }

    pub fn in_group(&self, group: i64) -> impl Iterator<Item = &Student> {
        self.students.iter().filter(move |s| s.group == group)
    }

    /// Distinct group ids, ascending.
    pub fn groups(&self) -> Vec<i64> {
        self.students
            .iter()
            .map(|s| s.group)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

/// Reads both homework sheets and merges them.
///
/// # Errors
///
/// Fails without producing a store if either sheet is missing or malformed.
pub fn load(hw01: &Path, hw02: &Path) -> Result<StudentStore> {
    let (a, b) = read_sheets(hw01, hw02)?;
    Ok(StudentStore::from_sheets(&a, &b))
}

fn read_sheets(hw01: &Path, hw02: &Path) -> Result<(Vec<ScoreRow>, Vec<ScoreRow>)> {
    let a = read_score_sheet(hw01, Assignment::Hw01.name())?;
    let b = read_score_sheet(hw02, Assignment::Hw02.name())?;
    Ok((a, b))
}

/// Where a snapshot is loaded from.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub hw01: PathBuf,
    pub hw02: PathBuf,
    pub exam: Option<PathBuf>,
}

/// An immutable, fully loaded store together with load metadata.
#[derive(Debug)]
pub struct Snapshot {
    pub store: StudentStore,
    pub summary: StoreSummary,
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(store: StudentStore, summary: StoreSummary) -> Self {
        Self {
            store,
            summary,
            loaded_at: Utc::now(),
        }
    }

    /// Wraps a store built in memory, with no sheet provenance.
    pub fn from_store(store: StudentStore) -> Self {
        let summary = StoreSummary::from_store(&store);
        Self::new(store, summary)
    }
}

/// Loads every configured source into a new snapshot.
#[tracing::instrument(skip_all, fields(hw01 = %sources.hw01.display(), hw02 = %sources.hw02.display()))]
pub fn load_snapshot(sources: &SourcePaths) -> Result<Snapshot> {
    let (a, b) = read_sheets(&sources.hw01, &sources.hw02)?;
    let mut store = StudentStore::from_sheets(&a, &b);

    if let Some(exam_path) = &sources.exam {
        let exams = read_exam_sheet(exam_path)?;
        let unknown = store.apply_exams(&exams);
        if !unknown.is_empty() {
            warn!(
                path = %exam_path.display(),
                skipped = unknown.len(),
                ids = ?unknown,
                "Exam rows for unknown students skipped"
            );
        }
    }

    let ids_a: HashSet<i64> = a.iter().map(|r| r.student_id).collect();
    let ids_b: HashSet<i64> = b.iter().map(|r| r.student_id).collect();
    let summary = StoreSummary::from_sheets(&store, &ids_a, &ids_b);

    info!(
        students = summary.students,
        groups = summary.groups,
        only_in_hw01 = summary.only_in_hw01,
        only_in_hw02 = summary.only_in_hw02,
        in_both = summary.in_both,
        "Student store loaded"
    );

    Ok(Snapshot::new(store, summary))
}

/// The live snapshot plus the sources needed to rebuild it.
///
/// Readers clone the inner `Arc` and release the lock straight away, so a
/// query always runs against one complete snapshot.
#[derive(Debug)]
pub struct SharedStore {
    sources: Option<SourcePaths>,
    current: RwLock<Arc<Snapshot>>,
}

impl SharedStore {
    /// Loads the sources once. Fails if any of them cannot be loaded.
    pub fn open(sources: SourcePaths) -> Result<Self> {
        let snapshot = load_snapshot(&sources)?;
        Ok(Self {
            sources: Some(sources),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// A store with no backing files. `reload` keeps the current snapshot.
    pub fn fixed(snapshot: Snapshot) -> Self {
        Self {
            sources: None,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Rebuilds the snapshot from the sources and swaps it in. On error the
    /// current snapshot stays in place.
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let Some(sources) = &self.sources else {
            return Ok(self.snapshot());
        };

        let fresh = Arc::new(load_snapshot(sources)?);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&fresh);
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(student_id: i64, name: &str, group: i64, score: i64) -> ScoreRow {
        ScoreRow {
            student_id,
            name: name.to_string(),
            group,
            score,
        }
    }

    #[test]
    fn test_assignment_parse() {
        assert_eq!("hw-01".parse::<Assignment>().unwrap(), Assignment::Hw01);
        assert_eq!("hw-02".parse::<Assignment>().unwrap(), Assignment::Hw02);
        assert!(matches!(
            "hw_01".parse::<Assignment>(),
            Err(GradeError::UnknownAssignment(name)) if name == "hw_01"
        ));
        assert!("hw-03".parse::<Assignment>().is_err());
    }

    #[test]
    fn test_merge_defaults_missing_scores() {
        let store = StudentStore::from_sheets(
            &[row(1, "Anna", 10, 80)],
            &[row(2, "Boris", 20, 90)],
        );

        assert_eq!(store.get(1).unwrap().hw_02, 0);
        assert_eq!(store.get(2).unwrap().hw_01, 0);
        assert_eq!(store.get(2).unwrap().exam, 0);
    }

    #[test]
    fn test_merge_keeps_first_name_and_group() {
        let store = StudentStore::from_sheets(
            &[row(1, "Anna", 10, 80)],
            &[row(1, "Anna K.", 99, 60)],
        );

        assert_eq!(store.len(), 1);
        let s = store.get(1).unwrap();
        assert_eq!(s.name, "Anna");
        assert_eq!(s.group, 10);
        assert_eq!(s.hw_01, 80);
        assert_eq!(s.hw_02, 60);
    }

    #[test]
    fn test_merge_same_id_twice_is_one_record() {
        let rows = [row(5, "Gleb", 3, 40), row(5, "Other", 4, 45)];
        let store = StudentStore::from_sheets(&rows, &[]);

        assert_eq!(store.len(), 1);
        let s = store.get(5).unwrap();
        assert_eq!((s.name.as_str(), s.group), ("Gleb", 3));
        assert_eq!(s.hw_01, 45);
    }

    #[test]
    fn test_insertion_order() {
        let store = StudentStore::from_sheets(
            &[row(3, "C", 1, 0), row(1, "A", 1, 0)],
            &[row(2, "B", 1, 0), row(3, "C", 1, 0)],
        );

        let ids: Vec<i64> = store.iter().map(|s| s.student_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_apply_exams_reports_unknown_ids() {
        let mut store = StudentStore::from_sheets(&[row(1, "Anna", 10, 80)], &[]);
        let unknown = store.apply_exams(&[
            ExamRow {
                student_id: 1,
                exam: 70,
            },
            ExamRow {
                student_id: 9,
                exam: 30,
            },
        ]);

        assert_eq!(unknown, vec![9]);
        assert_eq!(store.get(1).unwrap().exam, 70);
        assert!(store.get(9).is_none());
    }

    #[test]
    fn test_groups_sorted_unique() {
        let store = StudentStore::from_sheets(
            &[row(1, "A", 20, 0), row(2, "B", 10, 0), row(3, "C", 20, 0)],
            &[],
        );
        assert_eq!(store.groups(), vec![10, 20]);
        assert_eq!(store.in_group(20).count(), 2);
    }

    #[test]
    fn test_fixed_store_reload_keeps_snapshot() {
        let store = StudentStore::from_sheets(&[row(1, "A", 1, 10)], &[]);
        let shared = SharedStore::fixed(Snapshot::from_store(store));

        let before = shared.snapshot();
        let after = shared.reload().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }
}
