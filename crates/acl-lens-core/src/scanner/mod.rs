pub mod sources;
pub mod walk;

pub use sources::{mode_entries, AclSource, FolderLister, FsLister, ModeBitsAcl};
pub use walk::{effective_entries, TreeScanner};
