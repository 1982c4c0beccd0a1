use crate::error::SourceError;
use crate::identity::classify::EVERYONE_SID;
use crate::model::{AccessDecision, FolderAcl, RawAce};
use crate::permissions::rights;
use crate::permissions::{InheritanceFlags, PropagationFlags};
use std::fs;
use std::path::Path;
use tracing::{trace, warn};

/// Enumerates child folders during the walk.
pub trait FolderLister: Send + Sync {
    fn is_folder(&self, path: &str) -> bool;

    /// Full paths of the direct child folders of `path`.
    fn list_children(&self, path: &str) -> Result<Vec<String>, SourceError>;
}

/// OS ACL source: reads the access-control entries of one folder.
pub trait AclSource: Send + Sync {
    /// All entries of the folder, inherited ones included.
    fn read_acl(&self, path: &str) -> Result<FolderAcl, SourceError>;

    /// Share-layer ACL that fronts `root`, when the root is reached through a share.
    fn share_acl(&self, _root: &str) -> Option<Vec<RawAce>> {
        None
    }
}

/// Lists folders straight from the local filesystem. Symlinks and plain
/// files are skipped; children come back sorted by name.
pub struct FsLister;

impl FolderLister for FsLister {
    fn is_folder(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, SourceError> {
        let mut children = Vec::new();
        for entry_result in fs::read_dir(path)? {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error reading entry in directory {}: {}", path, err);
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!("Error getting file type for {}: {}", entry.path().display(), err);
                    continue;
                }
            };
            if file_type.is_symlink() || !file_type.is_dir() {
                trace!("Skipping non-folder {}", entry.path().display());
                continue;
            }
            children.push(entry.path().to_string_lossy().into_owned());
        }
        children.sort();
        Ok(children)
    }
}

/// ACL source for hosts without NT-style ACLs: the owner, group and other
/// permission bits of each folder become three allow entries.
pub struct ModeBitsAcl;

impl AclSource for ModeBitsAcl {
    #[cfg(unix)]
    fn read_acl(&self, path: &str) -> Result<FolderAcl, SourceError> {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::metadata(path)?;
        Ok(FolderAcl {
            protected: false,
            entries: mode_entries(meta.mode(), meta.uid(), meta.gid()),
        })
    }

    #[cfg(not(unix))]
    fn read_acl(&self, path: &str) -> Result<FolderAcl, SourceError> {
        Err(SourceError::new(
            crate::model::ScanErrorKind::Other,
            format!("permission bits are not available for {}", path),
        ))
    }
}

fn triad_mask(bits: u32) -> u32 {
    let mut mask = 0;
    if bits & 0o4 != 0 {
        mask |= rights::READ;
    }
    if bits & 0o2 != 0 {
        mask |= rights::WRITE | rights::DELETE | rights::DELETE_SUBDIRECTORIES_AND_FILES;
    }
    if bits & 0o1 != 0 {
        mask |= rights::TRAVERSE;
    }
    mask
}

/// Entries for a `mode`/`uid`/`gid` triple. An owner holding every bit is
/// given full control, since the owner can always change the mode.
pub fn mode_entries(mode: u32, uid: u32, gid: u32) -> Vec<RawAce> {
    let entry = |id: String, name: Option<String>, mask: u32| RawAce {
        principal_id: id,
        account_name: name,
        decision: AccessDecision::Allow,
        mask,
        inherited: false,
        inheritance_flags: InheritanceFlags::NONE,
        propagation_flags: PropagationFlags::NONE,
    };

    let owner_bits = (mode >> 6) & 0o7;
    let owner_mask = if owner_bits == 0o7 {
        rights::FULL_CONTROL
    } else {
        triad_mask(owner_bits) | rights::READ_PERMISSIONS | rights::CHANGE_PERMISSIONS
    };

    let mut entries = vec![entry(format!("uid:{}", uid), None, owner_mask)];
    let group_mask = triad_mask((mode >> 3) & 0o7);
    if group_mask != 0 {
        entries.push(entry(format!("gid:{}", gid), None, group_mask));
    }
    let other_mask = triad_mask(mode & 0o7);
    if other_mask != 0 {
        entries.push(entry(
            EVERYONE_SID.to_string(),
            Some("Everyone".to_string()),
            other_mask,
        ));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::AccessRank;

    #[cfg(unix)]
    #[test]
    fn test_fs_lister_keeps_siblings_of_skipped_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("b")).unwrap();
        fs::create_dir(root.join("a")).unwrap();
        fs::write(root.join("notes.txt"), "file").unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("dangling")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("link_to_a")).unwrap();

        let children = FsLister
            .list_children(&root.to_string_lossy())
            .unwrap();
        let names: Vec<&str> = children
            .iter()
            .map(|c| crate::platform::folder_name(c))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_mode_entries() {
        let entries = mode_entries(0o40750, 1000, 100);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].principal_id, "uid:1000");
        assert_eq!(entries[0].mask, rights::FULL_CONTROL);
        assert_eq!(entries[1].principal_id, "gid:100");
        assert_eq!(AccessRank::from_mask(entries[1].mask), AccessRank::Read);
    }

    #[test]
    fn test_world_writable_folder() {
        let entries = mode_entries(0o777, 0, 0);
        let everyone = entries
            .iter()
            .find(|e| e.principal_id == EVERYONE_SID)
            .unwrap();
        assert_eq!(AccessRank::from_mask(everyone.mask), AccessRank::Modify);
    }

    #[test]
    fn test_read_only_owner() {
        let entries = mode_entries(0o500, 0, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(AccessRank::from_mask(entries[0].mask), AccessRank::Read);
    }
}
