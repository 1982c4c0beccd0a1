pub mod baseline;
pub mod engine;
pub mod explain;
pub mod key;

pub use baseline::BaselineSnapshot;
pub use engine::{
    apply_baseline, compute_parent_diffs, diff_acl, diff_key_sets, key_set, AclDiffSummary,
    BaselineDiffSummary, ModifiedAce,
};
pub use explain::{explain, DiffStatus, ParentDiffExplanation};
pub use key::AclDiffKey;
