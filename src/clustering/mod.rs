// Module declarations
pub mod merging;
pub mod store;
pub mod types;

pub use types::*;

pub use merging::MergeOutcome;
pub use store::{ClusterStore, EditOutcome, RecordedEdit, StoreStats};
