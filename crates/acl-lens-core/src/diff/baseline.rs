use super::engine::{diff_key_sets, key_set, BaselineDiffSummary};
use super::key::AclDiffKey;
use crate::error::Error;
use crate::model::ScanResult;
use crate::platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// ACL key sets captured from an earlier scan, keyed by folder path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub captured_at: DateTime<Utc>,
    pub root: String,
    folders: BTreeMap<String, Vec<AclDiffKey>>,
}

impl BaselineSnapshot {
    pub fn from_scan(result: &ScanResult) -> Self {
        let folders = result
            .folders
            .iter()
            .filter(|f| !f.had_read_error())
            .map(|f| (platform::path_key(&f.path), key_set(f)))
            .collect();
        Self {
            captured_at: Utc::now(),
            root: result.root.clone(),
            folders,
        }
    }

    pub fn keys_for(&self, path: &str) -> Option<&[AclDiffKey]> {
        self.folders
            .get(&platform::path_key(path))
            .map(|keys| keys.as_slice())
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn folders(&self) -> impl Iterator<Item = (&str, &[AclDiffKey])> {
        self.folders.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&data)?;
        info!(
            "Loaded baseline of {} folders captured {}",
            snapshot.folder_count(),
            snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Folder-by-folder changes from `earlier` to this baseline. Folders only
    /// in this baseline are flagged `new_folder`; folders only in `earlier`
    /// report all their keys as removed. Unchanged folders are left out.
    pub fn changes_since(&self, earlier: &BaselineSnapshot) -> BTreeMap<String, BaselineDiffSummary> {
        let mut changes = BTreeMap::new();
        for (path, keys) in &self.folders {
            let summary = match earlier.folders.get(path) {
                Some(previous) => diff_key_sets(keys, previous),
                None => BaselineDiffSummary {
                    new_folder: true,
                    ..diff_key_sets(keys, &[])
                },
            };
            if summary.new_folder || !summary.is_unchanged() {
                changes.insert(path.clone(), summary);
            }
        }
        for (path, previous) in &earlier.folders {
            if !self.folders.contains_key(path) && !previous.is_empty() {
                changes.insert(path.clone(), diff_key_sets(&[], previous));
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessDecision, AceEntry, FolderDetail, PrincipalType, Provenance};
    use crate::permissions::rights::{MODIFY, READ};
    use crate::permissions::{InheritanceFlags, PropagationFlags};

    fn folder(path: &str, grants: &[(&str, u32)]) -> FolderDetail {
        let mut detail = FolderDetail::new(path, 0);
        for (id, mask) in grants {
            detail.push_entry(AceEntry {
                folder_path: path.to_string(),
                principal_name: id.to_string(),
                principal_id: id.to_string(),
                principal_type: PrincipalType::User,
                decision: AccessDecision::Allow,
                rights: crate::permissions::rights::summarize(*mask),
                mask: *mask,
                inherited: false,
                inheritance_flags: InheritanceFlags::BOTH,
                propagation_flags: PropagationFlags::NONE,
                provenance: Provenance::Direct,
                depth: 0,
                disabled: false,
                expanded_members: None,
            });
        }
        detail
    }

    fn baseline(folders: Vec<FolderDetail>) -> BaselineSnapshot {
        let mut result = ScanResult::new(folders[0].path.clone());
        for f in folders {
            result.push_folder(f);
        }
        BaselineSnapshot::from_scan(&result)
    }

    #[test]
    fn test_read_errors_are_not_captured() {
        let mut broken = folder("/srv/b", &[]);
        broken.read_error = Some("denied".to_string());
        let snapshot = baseline(vec![folder("/srv", &[("A", READ)]), broken]);
        assert_eq!(snapshot.folder_count(), 1);
        assert!(snapshot.keys_for("/SRV").is_some());
    }

    #[test]
    fn test_changes_since() {
        let earlier = baseline(vec![
            folder("/srv", &[("A", READ)]),
            folder("/srv/same", &[("A", READ)]),
            folder("/srv/gone", &[("B", READ)]),
        ]);
        let later = baseline(vec![
            folder("/srv", &[("A", MODIFY)]),
            folder("/srv/same", &[("A", READ)]),
            folder("/srv/new", &[]),
        ]);

        let changes = later.changes_since(&earlier);
        assert_eq!(changes.len(), 3);
        let root = &changes[&platform::path_key("/srv")];
        assert_eq!((root.added_count(), root.removed_count()), (1, 1));
        assert!(changes[&platform::path_key("/srv/new")].new_folder);
        assert_eq!(changes[&platform::path_key("/srv/gone")].removed_count(), 1);
    }
}
