pub mod aggregator;
pub mod commit;
pub mod plan_builder;
pub mod scanner;
pub mod summarize;
pub mod summary_store;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{ChangeAggregator, ChangeBatch, WatchEvent, WatchEventKind};
pub use commit::{execute_commit, CommitOutcome, CommitRequest};
pub use plan_builder::{PlanBuilder, ReorganizationPlan};
pub use scanner::PathFilter;
pub use summary_store::SummaryStore;
