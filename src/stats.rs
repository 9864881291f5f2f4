use std::collections::HashSet;

use serde::Serialize;

use crate::store::StudentStore;

/// Counts describing how the two homework sheets overlapped.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub students: usize,
    pub groups: usize,

    // sheet provenance
    pub only_in_hw01: usize,
    pub only_in_hw02: usize,
    pub in_both: usize,

    pub with_exam: usize,
}

impl StoreSummary {
    pub fn from_sheets(
        store: &StudentStore,
        hw01_ids: &HashSet<i64>,
        hw02_ids: &HashSet<i64>,
    ) -> Self {
        let mut s = Self::from_store(store);

        for student in store.iter() {
            match (
                hw01_ids.contains(&student.student_id),
                hw02_ids.contains(&student.student_id),
            ) {
                (true, true) => s.in_both += 1,
                (true, false) => s.only_in_hw01 += 1,
                (false, true) => s.only_in_hw02 += 1,
                (false, false) => {}
            }
        }

        s
    }

    /// Summary of a store with unknown provenance. Overlap counts stay zero.
    pub fn from_store(store: &StudentStore) -> Self {
        StoreSummary {
            students: store.len(),
            groups: store.groups().len(),
            with_exam: store.iter().filter(|s| s.exam != 0).count(),
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of students that appear in both sheets.
    pub fn overlap_pct(&self) -> f64 {
        Self::pct(self.in_both, self.students)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ScoreRow;

    fn row(student_id: i64, group: i64) -> ScoreRow {
        ScoreRow {
            student_id,
            name: format!("s{student_id}"),
            group,
            score: 1,
        }
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(StoreSummary::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(StoreSummary::pct(50, 100), 50.0);
        assert_eq!(StoreSummary::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_sheets_counts_overlap() {
        let a = [row(1, 10), row(2, 10)];
        let b = [row(2, 10), row(3, 20)];
        let store = StudentStore::from_sheets(&a, &b);
        let ids_a: HashSet<i64> = a.iter().map(|r| r.student_id).collect();
        let ids_b: HashSet<i64> = b.iter().map(|r| r.student_id).collect();

        let s = StoreSummary::from_sheets(&store, &ids_a, &ids_b);

        assert_eq!(s.students, 3);
        assert_eq!(s.groups, 2);
        assert_eq!(s.only_in_hw01, 1);
        assert_eq!(s.only_in_hw02, 1);
        assert_eq!(s.in_both, 1);
        assert_eq!(s.with_exam, 0);
    }

    #[test]
    fn test_overlap_pct_empty_store() {
        let s = StoreSummary::from_store(&StudentStore::new());
        assert_eq!(s.students, 0);
        assert_eq!(s.overlap_pct(), 0.0);
    }
}
