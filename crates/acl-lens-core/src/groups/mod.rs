pub mod cache;
pub mod expand;

pub use cache::{GroupMembershipCache, DEFAULT_GROUP_CACHE_TTL};
pub use expand::GroupExpander;
