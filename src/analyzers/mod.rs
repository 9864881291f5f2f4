//! Aggregation over a loaded [`StudentStore`](crate::store::StudentStore).
//!
//! Every function here is pure: it reads the store it is given and owns the
//! policy for empty selections and invalid inputs.

pub mod aggregate;
pub mod grade;
pub mod types;
pub mod utility;

pub use aggregate::{mean_score, mean_score_for_group, table_rows};
pub use grade::{average_mark_for_group, mark, mark_for};
pub use types::TableRow;
