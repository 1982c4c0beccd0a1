use super::baseline::BaselineSnapshot;
use super::key::AclDiffKey;
use crate::model::{AccessDecision, FolderDetail, ScanResult};
use crate::platform;
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A parent/child pair for the same principal and decision whose keys differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedAce {
    pub parent: AclDiffKey,
    pub child: AclDiffKey,
}

/// How a folder's ACL differs from its parent's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclDiffSummary {
    pub protected: bool,
    pub explicit_count: usize,
    pub deny_explicit_count: usize,
    pub added: Vec<AclDiffKey>,
    pub removed: Vec<AclDiffKey>,
    pub modified: Vec<ModifiedAce>,
}

impl AclDiffSummary {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// How a folder's ACL differs from a previously captured baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineDiffSummary {
    pub added: Vec<AclDiffKey>,
    pub removed: Vec<AclDiffKey>,
    /// The folder did not exist in the baseline.
    pub new_folder: bool,
}

impl BaselineDiffSummary {
    pub fn added_count(&self) -> usize {
        self.added.len()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff keys for the entries set on the folder itself, in entry order and
/// without duplicates. Entries synthesized from group expansion are left out
/// so that no key appears twice with different provenance.
pub fn key_set(folder: &FolderDetail) -> Vec<AclDiffKey> {
    let mut seen = AHashSet::new();
    folder
        .direct_entries()
        .map(AclDiffKey::from_entry)
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Compare `child` against `parent`; a missing parent counts as an empty ACL.
pub fn diff_acl(parent: Option<&FolderDetail>, child: &FolderDetail) -> AclDiffSummary {
    let child_keys = key_set(child);
    let parent_keys = parent.map(key_set).unwrap_or_default();

    let (added, removed) = set_difference(&child_keys, &parent_keys);
    let modified = correlate_modified(&parent_keys, &child_keys);

    let explicit: Vec<_> = child.direct_entries().filter(|e| e.is_explicit()).collect();

    AclDiffSummary {
        protected: child.inheritance_disabled,
        explicit_count: explicit.len(),
        deny_explicit_count: explicit
            .iter()
            .filter(|e| e.decision == AccessDecision::Deny)
            .count(),
        added,
        removed,
        modified,
    }
}

/// Added/removed between two arbitrary key sets, for baseline badges.
pub fn diff_key_sets(current: &[AclDiffKey], baseline: &[AclDiffKey]) -> BaselineDiffSummary {
    let (added, removed) = set_difference(current, baseline);
    BaselineDiffSummary {
        added,
        removed,
        new_folder: false,
    }
}

/// Populate every folder's parent diff. The parent is the folder one level
/// up in the same result set. Re-running over the same result yields the
/// same summaries.
pub fn compute_parent_diffs(result: &mut ScanResult) {
    let summaries: Vec<AclDiffSummary> = result
        .folders
        .par_iter()
        .map(|folder| {
            let parent = platform::parent_folder(&folder.path).and_then(|p| result.folder(p));
            diff_acl(parent, folder)
        })
        .collect();

    for (folder, summary) in result.folders.iter_mut().zip(summaries) {
        folder.diff = Some(summary);
    }
    debug!("Computed parent diffs for {} folders", result.folders.len());
}

/// Populate every folder's baseline diff from `baseline`.
///
/// Folders whose ACL could not be read keep `baseline_diff = None`: an empty
/// key set there says nothing about what changed.
pub fn apply_baseline(result: &mut ScanResult, baseline: &BaselineSnapshot) {
    let summaries: Vec<Option<BaselineDiffSummary>> = result
        .folders
        .par_iter()
        .map(|folder| {
            if folder.had_read_error() {
                return None;
            }
            let current = key_set(folder);
            Some(match baseline.keys_for(&folder.path) {
                Some(previous) => diff_key_sets(&current, previous),
                None => BaselineDiffSummary {
                    new_folder: true,
                    ..diff_key_sets(&current, &[])
                },
            })
        })
        .collect();

    for (folder, summary) in result.folders.iter_mut().zip(summaries) {
        folder.baseline_diff = summary;
    }
}

fn set_difference(
    left: &[AclDiffKey],
    right: &[AclDiffKey],
) -> (Vec<AclDiffKey>, Vec<AclDiffKey>) {
    let left_set: AHashSet<&AclDiffKey> = left.iter().collect();
    let right_set: AHashSet<&AclDiffKey> = right.iter().collect();

    let only_left = left.iter().filter(|k| !right_set.contains(k)).cloned().collect();
    let only_right = right.iter().filter(|k| !left_set.contains(k)).cloned().collect();
    (only_left, only_right)
}

/// Pair parent and child keys sharing (principal, decision) in their
/// original order and keep the pairs that differ.
fn correlate_modified(parent: &[AclDiffKey], child: &[AclDiffKey]) -> Vec<ModifiedAce> {
    let mut parent_groups: AHashMap<(String, AccessDecision), Vec<&AclDiffKey>> = AHashMap::new();
    for key in parent {
        parent_groups.entry(key.correlation()).or_default().push(key);
    }

    let mut modified = Vec::new();
    let mut handled = AHashSet::new();
    for key in child {
        let group = key.correlation();
        if !handled.insert(group.clone()) {
            continue;
        }
        let Some(parent_side) = parent_groups.get(&group) else {
            continue;
        };
        let child_side = child.iter().filter(|k| k.correlation() == group);
        for (p, c) in parent_side.iter().zip(child_side) {
            if *p != c {
                modified.push(ModifiedAce {
                    parent: (*p).clone(),
                    child: c.clone(),
                });
            }
        }
    }
    modified
}
