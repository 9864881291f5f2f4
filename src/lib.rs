pub mod analyzers;
pub mod error;
pub mod output;
pub mod parser;
pub mod query;
pub mod server;
pub mod stats;
pub mod store;

pub use error::GradeError;
pub use store::{Assignment, SharedStore, Snapshot, SourcePaths, Student, StudentStore};
