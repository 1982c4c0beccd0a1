pub mod cache;
pub mod classify;
pub mod resolver;
pub mod source;

pub use cache::{CachedIdentity, IdentityCache};
pub use resolver::{PrincipalResolver, ResolvedPrincipal};
pub use source::{
    ChainedDirectory, DirectoryMember, DirectoryPrincipal, DirectorySource, NameTranslator,
    NoTranslation, OfflineDirectory,
};
