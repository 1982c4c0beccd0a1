use acl_lens_core::ResolverBackend;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "acl-lens")]
#[command(about = "Audit folder permissions against their parents", long_about = None)]
pub struct Cli {
    /// Log debug output from the scanner and resolver
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a folder tree and explain how each folder differs from its parent
    Scan(ScanArgs),
    /// List every user reachable from a group, nested groups included
    ExpandGroup {
        group_id: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Check whether a user belongs to a privileged group
    IsPrivileged {
        user_id: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Compare two saved baselines folder by folder
    BaselineDiff { before: PathBuf, after: PathBuf },
    /// Display the number of cached identities
    CacheStats,
    /// Delete every cached identity
    ClearCache {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Read folders, ACLs and principals from an ACL snapshot document
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Folder to scan; defaults to `scan.root_path` from the configuration
    pub root: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Skip inherited entries
    #[arg(long)]
    pub no_inherited: bool,

    /// Keep raw identifiers instead of resolving account names
    #[arg(long)]
    pub no_resolve: bool,

    /// Attribute group grants to each member user
    #[arg(long)]
    pub expand_groups: bool,

    #[arg(long)]
    pub exclude_service_accounts: bool,

    #[arg(long)]
    pub exclude_admin_accounts: bool,

    /// Score folders on share-and-NTFS effective access
    #[arg(long)]
    pub effective: bool,

    /// Skip folders whose name or path matches this glob (repeatable)
    #[arg(long = "ignore")]
    pub ignore_patterns: Vec<String>,

    /// Compare the scan against a saved baseline
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Save the scan as a baseline
    #[arg(long)]
    pub save_baseline: Option<PathBuf>,

    /// Print folders whose status is "Same" too
    #[arg(long)]
    pub all: bool,

    /// List each printed folder's entries with rights and scope
    #[arg(long)]
    pub entries: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Auto,
    Primary,
    Fallback,
    LocalOnly,
}

impl From<BackendArg> for ResolverBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => ResolverBackend::Auto,
            BackendArg::Primary => ResolverBackend::Primary,
            BackendArg::Fallback => ResolverBackend::Fallback,
            BackendArg::LocalOnly => ResolverBackend::LocalOnly,
        }
    }
}
