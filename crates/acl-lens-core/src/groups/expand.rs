use super::cache::GroupMembershipCache;
use crate::error::Error;
use crate::identity::classify;
use crate::identity::{DirectoryMember, DirectorySource};
use ahash::AHashSet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Transitive group expansion over the directory, cache first.
pub struct GroupExpander {
    cache: Arc<GroupMembershipCache>,
    directory: Arc<dyn DirectorySource>,
}

impl GroupExpander {
    pub fn new(cache: Arc<GroupMembershipCache>, directory: Arc<dyn DirectorySource>) -> Self {
        Self { cache, directory }
    }

    pub fn cache(&self) -> &Arc<GroupMembershipCache> {
        &self.cache
    }

    /// Every distinct non-group member reachable from `group_id`.
    ///
    /// Breadth-first over a visited set of group identifiers, so membership
    /// cycles terminate. Members are deduplicated by identifier, or by name
    /// when the identifier is missing. The cancel flag is polled once per
    /// dequeued group.
    pub fn expand(&self, group_id: &str, cancel: &AtomicBool) -> Result<Vec<DirectoryMember>, Error> {
        let mut visited: AHashSet<String> = AHashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut accumulated: Vec<DirectoryMember> = Vec::new();

        visited.insert(group_id.to_lowercase());
        queue.push_back(group_id.to_string());

        while let Some(current) = queue.pop_front() {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }

            for member in self.direct_members(&current) {
                if !member.is_group {
                    accumulated.push(member);
                    continue;
                }
                match member.id.as_deref().filter(|id| !id.is_empty()) {
                    Some(id) => {
                        if visited.insert(id.to_lowercase()) {
                            queue.push_back(id.to_string());
                        }
                    }
                    None => debug!(
                        "Skipping nested group '{}' of {}: no identifier to expand",
                        member.name, current
                    ),
                }
            }
        }

        let mut seen: AHashSet<String> = AHashSet::new();
        accumulated.retain(|m| seen.insert(m.identity_key()));
        debug!(
            "Expanded {} into {} members across {} groups",
            group_id,
            accumulated.len(),
            visited.len()
        );
        Ok(accumulated)
    }

    /// Direct members, from the cache when trustworthy, otherwise from the
    /// directory. Lookup failures count as "no members".
    pub fn direct_members(&self, group_id: &str) -> Vec<DirectoryMember> {
        if let Some(members) = self.cache.get(group_id) {
            trace!("Group cache hit for {}", group_id);
            return members;
        }
        match self.directory.group_members(group_id) {
            Ok(members) => {
                self.cache.insert(group_id, members.clone());
                members
            }
            Err(err) => {
                debug!("Member lookup for {} failed: {}", group_id, err);
                Vec::new()
            }
        }
    }

    /// True when any of the user's groups is a well-known privileged group.
    /// Lookup failures answer "not privileged".
    pub fn is_privileged_user(&self, user_id: &str) -> bool {
        match self.directory.principal_groups(user_id) {
            Ok(groups) => groups.iter().any(|g| classify::is_privileged_group_name(g)),
            Err(err) => {
                debug!("Group lookup for {} failed: {}", user_id, err);
                false
            }
        }
    }
}
