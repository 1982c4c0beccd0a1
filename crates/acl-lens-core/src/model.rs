use crate::diff::{AclDiffSummary, BaselineDiffSummary};
use crate::permissions::{
    resolve_scope, AppliesTo, InheritanceFlags, PermissionEntry, PropagationFlags,
};
use crate::platform;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Allow => f.write_str("Allow"),
            AccessDecision::Deny => f.write_str("Deny"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalType {
    User,
    Group,
}

/// Where an entry came from: set on the folder for the principal itself, or
/// synthesized for a member of a group that holds the entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    Direct,
    ViaGroup(String),
}

impl Provenance {
    pub fn is_direct(&self) -> bool {
        matches!(self, Provenance::Direct)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Direct => f.write_str("direct"),
            Provenance::ViaGroup(name) => write!(f, "via group:{}", name),
        }
    }
}

/// One ACE as reported by the OS ACL source, before any resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAce {
    pub principal_id: String,
    /// Account name when the ACL source already knows it.
    #[serde(default)]
    pub account_name: Option<String>,
    pub decision: AccessDecision,
    pub mask: u32,
    #[serde(default)]
    pub inherited: bool,
    #[serde(default)]
    pub inheritance_flags: InheritanceFlags,
    #[serde(default)]
    pub propagation_flags: PropagationFlags,
}

impl PermissionEntry for RawAce {
    fn principal_id(&self) -> &str {
        &self.principal_id
    }
    fn decision(&self) -> AccessDecision {
        self.decision
    }
    fn mask(&self) -> u32 {
        self.mask
    }
    fn is_inherited(&self) -> bool {
        self.inherited
    }
}

/// ACL of one folder as reported by the OS ACL source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderAcl {
    /// Inheritance from the parent is blocked.
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub entries: Vec<RawAce>,
}

/// One access-control fact attached to one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AceEntry {
    pub folder_path: String,
    pub principal_name: String,
    pub principal_id: String,
    pub principal_type: PrincipalType,
    pub decision: AccessDecision,
    pub rights: String,
    pub mask: u32,
    pub inherited: bool,
    pub inheritance_flags: InheritanceFlags,
    pub propagation_flags: PropagationFlags,
    pub provenance: Provenance,
    pub depth: usize,
    pub disabled: bool,
    pub expanded_members: Option<Vec<String>>,
}

impl AceEntry {
    pub fn is_group(&self) -> bool {
        self.principal_type == PrincipalType::Group
    }

    pub fn is_explicit(&self) -> bool {
        !self.inherited
    }

    pub fn is_explicit_deny(&self) -> bool {
        !self.inherited && self.decision == AccessDecision::Deny
    }

    pub fn inheritance_label(&self) -> String {
        self.inheritance_flags.label()
    }

    pub fn applies_to(&self) -> AppliesTo {
        resolve_scope(self.inheritance_flags, self.propagation_flags)
    }

    pub fn propagation_label(&self) -> String {
        self.propagation_flags.label()
    }
}

impl PermissionEntry for AceEntry {
    fn principal_id(&self) -> &str {
        &self.principal_id
    }
    fn decision(&self) -> AccessDecision {
        self.decision
    }
    fn mask(&self) -> u32 {
        self.mask
    }
    fn is_inherited(&self) -> bool {
        self.inherited
    }
}

/// Per-folder aggregate built during the scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderDetail {
    pub path: String,
    pub depth: usize,
    pub entries: Vec<AceEntry>,
    /// Entries after intersecting with the share layer; empty without one.
    pub effective_entries: Vec<AceEntry>,
    pub has_explicit_permissions: bool,
    pub inheritance_disabled: bool,
    pub read_error: Option<String>,
    pub diff: Option<AclDiffSummary>,
    pub baseline_diff: Option<BaselineDiffSummary>,
}

impl FolderDetail {
    pub fn new(path: impl Into<String>, depth: usize) -> Self {
        Self {
            path: path.into(),
            depth,
            ..Default::default()
        }
    }

    pub fn push_entry(&mut self, entry: AceEntry) {
        if entry.provenance.is_direct() && entry.is_explicit() {
            self.has_explicit_permissions = true;
        }
        self.entries.push(entry);
    }

    pub fn group_entries(&self) -> impl Iterator<Item = &AceEntry> {
        self.entries.iter().filter(|e| e.is_group())
    }

    pub fn user_entries(&self) -> impl Iterator<Item = &AceEntry> {
        self.entries.iter().filter(|e| !e.is_group())
    }

    /// Entries set on the folder itself, without synthesized group members.
    pub fn direct_entries(&self) -> impl Iterator<Item = &AceEntry> {
        self.entries.iter().filter(|e| e.provenance.is_direct())
    }

    pub fn had_read_error(&self) -> bool {
        self.read_error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    Enumerate,
    ReadAcl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanErrorKind {
    AccessDenied,
    PathTooLong,
    NotFound,
    Other,
}

impl ScanErrorKind {
    pub fn from_io(err: &std::io::Error) -> Self {
        if platform::is_path_too_long(err) {
            return ScanErrorKind::PathTooLong;
        }
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanErrorKind::AccessDenied,
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::Other,
        }
    }
}

/// A non-fatal per-folder failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub path: String,
    pub phase: ScanPhase,
    pub kind: ScanErrorKind,
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} at {}: {}", self.phase, self.kind, self.path, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    Completed,
    Cancelled,
}

/// Output of one scan invocation.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub root: String,
    pub status: ScanStatus,
    /// Folders in visitation (breadth-first) order.
    pub folders: Vec<FolderDetail>,
    /// Parent path → child paths, children sorted by name.
    pub tree: BTreeMap<String, Vec<String>>,
    pub errors: Vec<ScanError>,
    pub elapsed: Duration,
    index: AHashMap<String, usize>,
}

impl ScanResult {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            status: ScanStatus::Completed,
            folders: Vec::new(),
            tree: BTreeMap::new(),
            errors: Vec::new(),
            elapsed: Duration::ZERO,
            index: AHashMap::new(),
        }
    }

    pub fn push_folder(&mut self, folder: FolderDetail) {
        self.index
            .insert(platform::path_key(&folder.path), self.folders.len());
        self.folders.push(folder);
    }

    pub fn folder(&self, path: &str) -> Option<&FolderDetail> {
        self.index
            .get(&platform::path_key(path))
            .map(|&i| &self.folders[i])
    }

    pub fn is_root(&self, path: &str) -> bool {
        platform::path_key(path) == platform::path_key(&self.root)
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == ScanStatus::Cancelled
    }

    pub fn total_entries(&self) -> usize {
        self.folders.iter().map(|f| f.entries.len()).sum()
    }
}
