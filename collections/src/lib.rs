pub mod goal_subset;
pub mod ref_store;

pub use goal_subset::GoalSubset;
pub use ref_store::{Ref, RefPool, RefStore};
