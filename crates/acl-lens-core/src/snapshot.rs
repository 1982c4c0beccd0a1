//! Offline ACL snapshots.
//!
//! A snapshot is a JSON capture of a folder tree's ACLs together with the
//! principals they reference. It stands in for every platform source at
//! once (folder lister, ACL source, name translation, directory), so an
//! environment captured elsewhere can be audited on any host.

use crate::error::{DirectoryError, Error, SourceError};
use crate::identity::{DirectoryMember, DirectoryPrincipal, DirectorySource, NameTranslator};
use crate::model::{FolderAcl, RawAce, ScanErrorKind};
use crate::platform;
use crate::scanner::{AclSource, FolderLister};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFailure {
    pub kind: ScanErrorKind,
    pub message: String,
}

impl From<&SnapshotFailure> for SourceError {
    fn from(failure: &SnapshotFailure) -> Self {
        SourceError::new(failure.kind, failure.message.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFolder {
    pub path: String,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub entries: Vec<RawAce>,
    /// The ACL could not be read when the snapshot was taken.
    #[serde(default)]
    pub acl_error: Option<SnapshotFailure>,
    /// The folder's children could not be listed.
    #[serde(default)]
    pub list_error: Option<SnapshotFailure>,
}

/// Group member reference: a bare identifier, or an inline member that may
/// lack one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotMemberRef {
    Id(String),
    Inline {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        is_group: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPrincipal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub members: Vec<SnapshotMemberRef>,
    /// Group names, in addition to those derived from `members` lists.
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub folders: Vec<SnapshotFolder>,
    #[serde(default)]
    pub share: Option<Vec<RawAce>>,
    #[serde(default)]
    pub principals: Vec<SnapshotPrincipal>,
    #[serde(default = "default_true")]
    pub directory_available: bool,
}

/// Indexed, read-only view over a `SnapshotDocument`.
pub struct AclSnapshot {
    doc: SnapshotDocument,
    folders: AHashMap<String, usize>,
    children: AHashMap<String, Vec<String>>,
    principals: AHashMap<String, usize>,
}

impl AclSnapshot {
    pub fn new(doc: SnapshotDocument) -> Result<Self, Error> {
        let mut folders = AHashMap::new();
        let mut children: AHashMap<String, Vec<String>> = AHashMap::new();

        for (i, folder) in doc.folders.iter().enumerate() {
            let key = platform::path_key(&folder.path);
            if folders.insert(key, i).is_some() {
                return Err(Error::Snapshot(format!("duplicate folder {}", folder.path)));
            }
            if let Some(parent) = platform::parent_folder(&folder.path) {
                children
                    .entry(platform::path_key(parent))
                    .or_default()
                    .push(folder.path.clone());
            }
        }
        for list in children.values_mut() {
            list.sort_by_key(|p| platform::folder_name(p).to_lowercase());
        }

        let principals = doc
            .principals
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.to_uppercase(), i))
            .collect();

        Ok(Self {
            doc,
            folders,
            children,
            principals,
        })
    }

    pub fn from_json(data: &str) -> Result<Self, Error> {
        Self::new(serde_json::from_str(data)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let snapshot = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            "Loaded ACL snapshot with {} folders and {} principals from {}",
            snapshot.doc.folders.len(),
            snapshot.doc.principals.len(),
            path.display()
        );
        Ok(snapshot)
    }

    pub fn document(&self) -> &SnapshotDocument {
        &self.doc
    }

    fn folder(&self, path: &str) -> Option<&SnapshotFolder> {
        self.folders
            .get(&platform::path_key(path))
            .map(|&i| &self.doc.folders[i])
    }

    fn principal(&self, id: &str) -> Option<&SnapshotPrincipal> {
        self.principals
            .get(&id.to_uppercase())
            .map(|&i| &self.doc.principals[i])
    }

    fn member_for(&self, reference: &SnapshotMemberRef) -> DirectoryMember {
        match reference {
            SnapshotMemberRef::Id(id) => match self.principal(id) {
                Some(p) => DirectoryMember {
                    id: Some(p.id.clone()),
                    name: p.name.clone(),
                    is_group: p.is_group,
                    is_disabled: p.is_disabled,
                },
                None => DirectoryMember {
                    id: Some(id.clone()),
                    name: id.clone(),
                    is_group: false,
                    is_disabled: false,
                },
            },
            SnapshotMemberRef::Inline { id, name, is_group } => DirectoryMember {
                id: id.clone(),
                name: name.clone(),
                is_group: *is_group,
                is_disabled: false,
            },
        }
    }
}

impl FolderLister for AclSnapshot {
    fn is_folder(&self, path: &str) -> bool {
        self.folder(path).is_some()
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, SourceError> {
        let folder = self
            .folder(path)
            .ok_or_else(|| SourceError::new(ScanErrorKind::NotFound, format!("{} not in snapshot", path)))?;
        if let Some(failure) = &folder.list_error {
            return Err(failure.into());
        }
        Ok(self
            .children
            .get(&platform::path_key(path))
            .cloned()
            .unwrap_or_default())
    }
}

impl AclSource for AclSnapshot {
    fn read_acl(&self, path: &str) -> Result<FolderAcl, SourceError> {
        let folder = self
            .folder(path)
            .ok_or_else(|| SourceError::new(ScanErrorKind::NotFound, format!("{} not in snapshot", path)))?;
        if let Some(failure) = &folder.acl_error {
            return Err(failure.into());
        }
        Ok(FolderAcl {
            protected: folder.protected,
            entries: folder.entries.clone(),
        })
    }

    fn share_acl(&self, _root: &str) -> Option<Vec<RawAce>> {
        self.doc.share.clone()
    }
}

impl NameTranslator for AclSnapshot {
    fn translate(&self, id: &str) -> Option<String> {
        self.principal(id).map(|p| p.name.clone())
    }
}

impl DirectorySource for AclSnapshot {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn is_available(&self) -> bool {
        self.doc.directory_available
    }

    fn resolve_principal(&self, id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError> {
        if !self.doc.directory_available {
            return Err(DirectoryError::Unavailable);
        }
        Ok(self.principal(id).map(|p| DirectoryPrincipal {
            id: p.id.clone(),
            name: p.name.clone(),
            is_group: p.is_group,
            is_disabled: p.is_disabled,
        }))
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError> {
        if !self.doc.directory_available {
            return Err(DirectoryError::Unavailable);
        }
        let group = self
            .principal(group_id)
            .ok_or_else(|| DirectoryError::Lookup(format!("unknown group {}", group_id)))?;
        Ok(group.members.iter().map(|m| self.member_for(m)).collect())
    }

    fn principal_groups(&self, id: &str) -> Result<Vec<String>, DirectoryError> {
        if !self.doc.directory_available {
            return Err(DirectoryError::Unavailable);
        }
        let mut groups: Vec<String> = self
            .principal(id)
            .map(|p| p.groups.clone())
            .unwrap_or_default();

        for candidate in self.doc.principals.iter().filter(|p| p.is_group) {
            let contains = candidate.members.iter().any(|m| match m {
                SnapshotMemberRef::Id(member_id) => member_id.eq_ignore_ascii_case(id),
                SnapshotMemberRef::Inline { id: Some(member_id), .. } => {
                    member_id.eq_ignore_ascii_case(id)
                }
                SnapshotMemberRef::Inline { .. } => false,
            });
            if contains && !groups.iter().any(|g| g.eq_ignore_ascii_case(&candidate.name)) {
                groups.push(candidate.name.clone());
            }
        }
        Ok(groups)
    }
}
