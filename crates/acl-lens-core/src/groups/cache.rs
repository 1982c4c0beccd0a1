use crate::identity::DirectoryMember;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::trace;

pub const DEFAULT_GROUP_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CachedMembers {
    members: Vec<DirectoryMember>,
    fetched_at: Instant,
}

/// Time-bounded group identifier → direct members map.
#[derive(Debug)]
pub struct GroupMembershipCache {
    entries: DashMap<String, CachedMembers>,
    ttl: Duration,
}

impl Default for GroupMembershipCache {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_CACHE_TTL)
    }
}

impl GroupMembershipCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Direct members of `group_id` if cached, not expired, and trustworthy.
    ///
    /// A cached list holding a group-typed member with no identifier is
    /// treated as a miss: that member can never be re-expanded, so the list
    /// is refetched instead of served.
    pub fn get(&self, group_id: &str) -> Option<Vec<DirectoryMember>> {
        let key = cache_key(group_id);
        let entry = self.entries.get(&key)?;

        if entry.fetched_at.elapsed() >= self.ttl {
            trace!("Group cache entry for {} expired", group_id);
            drop(entry);
            self.entries.remove(&key);
            return None;
        }

        let untrusted = entry
            .members
            .iter()
            .any(|m| m.is_group && m.id.as_deref().map(str::is_empty).unwrap_or(true));
        if untrusted {
            trace!("Group cache entry for {} has an unexpandable group member", group_id);
            return None;
        }

        Some(entry.members.clone())
    }

    pub fn insert(&self, group_id: &str, members: Vec<DirectoryMember>) {
        self.entries.insert(
            cache_key(group_id),
            CachedMembers {
                members,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, group_id: &str) {
        self.entries.remove(&cache_key(group_id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

fn cache_key(id: &str) -> String {
    id.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: Option<&str>, name: &str, is_group: bool) -> DirectoryMember {
        DirectoryMember {
            id: id.map(str::to_string),
            name: name.to_string(),
            is_group,
            is_disabled: false,
        }
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = GroupMembershipCache::default();
        cache.insert("S-1-5-21-1-3000", vec![member(Some("S-1-5-21-1-1001"), "jdoe", false)]);
        assert_eq!(cache.get("s-1-5-21-1-3000").unwrap().len(), 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = GroupMembershipCache::new(Duration::ZERO);
        cache.insert("g", vec![member(Some("u"), "jdoe", false)]);
        assert!(cache.get("g").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_group_member_without_id_is_a_miss() {
        let cache = GroupMembershipCache::default();
        cache.insert(
            "g",
            vec![
                member(Some("u"), "jdoe", false),
                member(None, "Nested Team", true),
            ],
        );
        assert!(cache.get("g").is_none());
    }

    #[test]
    fn test_user_member_without_id_is_trusted() {
        let cache = GroupMembershipCache::default();
        cache.insert("g", vec![member(None, "contractor", false)]);
        assert_eq!(cache.get("g").unwrap().len(), 1);
    }
}
