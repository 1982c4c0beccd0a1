pub mod mask;
pub mod rights;
pub mod scope;

pub use mask::{intersect_masks, AccessAccumulator, AccessMap, PermissionEntry};
pub use rights::AccessRank;
pub use scope::{resolve_scope, AppliesTo, InheritanceFlags, PropagationFlags};
