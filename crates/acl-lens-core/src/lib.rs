pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod groups;
pub mod identity;
pub mod model;
pub mod permissions;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod snapshot;

pub use config::{AppConfig, ResolverBackend, ScanOptions};
pub use engine::{AuditEngine, PlatformSources};
pub use error::Error;
pub use model::{AceEntry, FolderDetail, ScanResult, ScanStatus};
pub use progress::{ProgressReporter, ScanProgress, SilentReporter};
pub use snapshot::AclSnapshot;
