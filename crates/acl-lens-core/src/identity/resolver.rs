use super::cache::{CachedIdentity, IdentityCache};
use super::classify;
use super::source::{DirectorySource, NameTranslator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// A principal with its display name and derived classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrincipal {
    pub id: String,
    pub display_name: String,
    pub is_group: bool,
    pub is_disabled: bool,
    pub is_service_account: bool,
    pub is_admin_account: bool,
}

impl ResolvedPrincipal {
    /// Build a principal, deriving the classification flags from name and id.
    pub fn classified(id: &str, display_name: &str, is_group: bool, is_disabled: bool) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            is_group,
            is_disabled,
            is_service_account: classify::is_service_account(display_name, id),
            is_admin_account: classify::is_admin_account(display_name, id),
        }
    }
}

/// Identifier → classified principal, fronted by the identity cache.
///
/// Resolution never fails: when every source comes up empty the best
/// available name is used (OS translation if any, else the raw identifier).
pub struct PrincipalResolver {
    cache: Arc<IdentityCache>,
    translator: Arc<dyn NameTranslator>,
    directory: Arc<dyn DirectorySource>,
    revalidate_users: bool,
}

impl PrincipalResolver {
    pub fn new(
        cache: Arc<IdentityCache>,
        translator: Arc<dyn NameTranslator>,
        directory: Arc<dyn DirectorySource>,
    ) -> Self {
        Self {
            cache,
            translator,
            directory,
            revalidate_users: true,
        }
    }

    /// Re-check the disabled state of cached users against the directory.
    pub fn with_revalidation(mut self, revalidate: bool) -> Self {
        self.revalidate_users = revalidate;
        self
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn directory(&self) -> &Arc<dyn DirectorySource> {
        &self.directory
    }

    pub fn resolve(&self, id: &str) -> ResolvedPrincipal {
        if let Some(cached) = self.cache.get(id) {
            trace!("Identity cache hit for {}", id);
            let cached = self.revalidate(id, cached);
            return ResolvedPrincipal::classified(id, &cached.name, cached.is_group, cached.is_disabled);
        }

        let os_name = self
            .translator
            .translate(id)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let directory_hit = if self.directory.is_available() {
            match self.directory.resolve_principal(id) {
                Ok(hit) => hit.filter(|p| !p.name.is_empty()),
                Err(err) => {
                    debug!("Directory lookup for {} failed: {}", id, err);
                    None
                }
            }
        } else {
            None
        };

        let identity = match (directory_hit, os_name) {
            (Some(dir), os_name) => CachedIdentity {
                // Prefer the OS form ("DOMAIN\account") for display consistency.
                name: os_name.unwrap_or(dir.name),
                is_group: dir.is_group,
                is_disabled: dir.is_disabled,
            },
            (None, Some(name)) => CachedIdentity {
                is_group: classify::is_well_known_group(id),
                name,
                is_disabled: false,
            },
            (None, None) => {
                debug!("Could not resolve {}, using raw identifier", id);
                return ResolvedPrincipal::classified(id, id, classify::is_well_known_group(id), false);
            }
        };

        self.cache.insert(id, identity.clone());
        ResolvedPrincipal::classified(id, &identity.name, identity.is_group, identity.is_disabled)
    }

    /// Principal from an ACL source that already supplied an account name,
    /// used when identity resolution is switched off.
    pub fn unresolved(id: &str, account_name: Option<&str>) -> ResolvedPrincipal {
        let name = account_name.filter(|n| !n.is_empty()).unwrap_or(id);
        ResolvedPrincipal::classified(id, name, classify::is_well_known_group(id), false)
    }

    fn revalidate(&self, id: &str, cached: CachedIdentity) -> CachedIdentity {
        if cached.is_group || !self.revalidate_users || !self.directory.is_available() {
            return cached;
        }
        match self.directory.resolve_principal(id) {
            Ok(Some(live)) if live.is_disabled != cached.is_disabled => {
                debug!("Disabled state of {} changed to {}", id, live.is_disabled);
                self.cache.set_disabled(id, live.is_disabled);
                CachedIdentity {
                    is_disabled: live.is_disabled,
                    ..cached
                }
            }
            _ => cached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DirectoryError;
    use crate::identity::source::{DirectoryMember, DirectoryPrincipal, NoTranslation, OfflineDirectory};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MapTranslator(HashMap<&'static str, &'static str>);

    impl NameTranslator for MapTranslator {
        fn translate(&self, id: &str) -> Option<String> {
            self.0.get(id).map(|s| s.to_string())
        }
    }

    struct OneUser {
        disabled: AtomicBool,
    }

    impl DirectorySource for OneUser {
        fn name(&self) -> &str {
            "one-user"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn resolve_principal(&self, id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError> {
            if id != "S-1-5-21-1-1001" {
                return Ok(None);
            }
            Ok(Some(DirectoryPrincipal {
                id: id.to_string(),
                name: "John Doe".to_string(),
                is_group: false,
                is_disabled: self.disabled.load(Ordering::SeqCst),
            }))
        }
        fn group_members(&self, _group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError> {
            Ok(vec![])
        }
        fn principal_groups(&self, _id: &str) -> Result<Vec<String>, DirectoryError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_unresolvable_id_echoes_identifier() {
        let resolver = PrincipalResolver::new(
            Arc::new(IdentityCache::new()),
            Arc::new(NoTranslation),
            Arc::new(OfflineDirectory),
        );
        let p = resolver.resolve("S-1-5-21-9-9-9-4242");
        assert_eq!(p.display_name, "S-1-5-21-9-9-9-4242");
        assert!(!p.is_group);
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_os_name_is_cached() {
        let mut names = HashMap::new();
        names.insert("S-1-5-32-544", r"BUILTIN\Administrators");
        let cache = Arc::new(IdentityCache::new());
        let resolver = PrincipalResolver::new(
            cache.clone(),
            Arc::new(MapTranslator(names)),
            Arc::new(OfflineDirectory),
        );
        let p = resolver.resolve("S-1-5-32-544");
        assert_eq!(p.display_name, r"BUILTIN\Administrators");
        assert!(p.is_group);
        assert!(p.is_admin_account);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cached_user_revalidates_disabled_state() {
        let directory = Arc::new(OneUser {
            disabled: AtomicBool::new(false),
        });
        let cache = Arc::new(IdentityCache::new());
        let resolver =
            PrincipalResolver::new(cache.clone(), Arc::new(NoTranslation), directory.clone());

        assert!(!resolver.resolve("S-1-5-21-1-1001").is_disabled);
        directory.disabled.store(true, Ordering::SeqCst);
        assert!(resolver.resolve("S-1-5-21-1-1001").is_disabled);
        assert!(cache.get("S-1-5-21-1-1001").unwrap().is_disabled);
    }

    #[test]
    fn test_revalidation_can_be_disabled() {
        let directory = Arc::new(OneUser {
            disabled: AtomicBool::new(false),
        });
        let resolver =
            PrincipalResolver::new(Arc::new(IdentityCache::new()), Arc::new(NoTranslation), directory.clone())
                .with_revalidation(false);

        resolver.resolve("S-1-5-21-1-1001");
        directory.disabled.store(true, Ordering::SeqCst);
        assert!(!resolver.resolve("S-1-5-21-1-1001").is_disabled);
    }
}
