use crate::error::DirectoryError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Principal as described by a directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPrincipal {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    #[serde(default)]
    pub is_disabled: bool,
}

/// A direct member of a group. Members coming back from some directory
/// queries carry no identifier, only a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMember {
    pub id: Option<String>,
    pub name: String,
    pub is_group: bool,
    #[serde(default)]
    pub is_disabled: bool,
}

impl DirectoryMember {
    /// Deduplication key: identifier when present, otherwise the name.
    pub fn identity_key(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.to_lowercase(),
            _ => self.name.to_lowercase(),
        }
    }

    pub fn display(&self) -> String {
        if self.is_disabled {
            format!("{} (disabled)", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Local OS identifier → account name translation.
pub trait NameTranslator: Send + Sync {
    /// Best-effort account name; `None` or empty when untranslatable.
    fn translate(&self, id: &str) -> Option<String>;
}

/// Translator for hosts without a local account database.
pub struct NoTranslation;

impl NameTranslator for NoTranslation {
    fn translate(&self, _id: &str) -> Option<String> {
        None
    }
}

/// A directory-membership source: native directory API, external query
/// tool, offline snapshot, and so on.
pub trait DirectorySource: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap availability probe. Sources enforce their own bounded wait.
    fn is_available(&self) -> bool;

    fn resolve_principal(&self, id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError>;

    fn group_members(&self, group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError>;

    /// Names of the groups `id` belongs to.
    fn principal_groups(&self, id: &str) -> Result<Vec<String>, DirectoryError>;
}

/// Source that is never available, used when directory lookups are off.
pub struct OfflineDirectory;

impl DirectorySource for OfflineDirectory {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn resolve_principal(&self, _id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError> {
        Err(DirectoryError::Unavailable)
    }

    fn group_members(&self, _group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError> {
        Err(DirectoryError::Unavailable)
    }

    fn principal_groups(&self, _id: &str) -> Result<Vec<String>, DirectoryError> {
        Err(DirectoryError::Unavailable)
    }
}

/// Priority chain over several sources. Each call tries the sources in
/// order and moves on when a source is unavailable, fails, or returns
/// nothing usable.
pub struct ChainedDirectory {
    sources: Vec<Arc<dyn DirectorySource>>,
}

impl ChainedDirectory {
    pub fn new(sources: Vec<Arc<dyn DirectorySource>>) -> Self {
        Self { sources }
    }

    pub fn primary_with_fallback(
        primary: Arc<dyn DirectorySource>,
        fallback: Arc<dyn DirectorySource>,
    ) -> Self {
        Self::new(vec![primary, fallback])
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Run `query` against each available source until one yields a usable
    /// value. An empty-but-successful answer is kept as the result of last
    /// resort; if every source was unavailable the chain is unavailable.
    fn first_usable<T, F, U>(&self, what: &str, query: F, usable: U) -> Result<T, DirectoryError>
    where
        F: Fn(&dyn DirectorySource) -> Result<T, DirectoryError>,
        U: Fn(&T) -> bool,
    {
        let mut last_answer: Option<T> = None;
        let mut last_error = DirectoryError::Unavailable;

        for source in &self.sources {
            if !source.is_available() {
                debug!("{}: source '{}' unavailable, trying next", what, source.name());
                continue;
            }
            match query(source.as_ref()) {
                Ok(answer) if usable(&answer) => return Ok(answer),
                Ok(answer) => {
                    debug!("{}: source '{}' returned nothing usable", what, source.name());
                    last_answer = Some(answer);
                }
                Err(err) => {
                    debug!("{}: source '{}' failed: {}", what, source.name(), err);
                    last_error = err;
                }
            }
        }

        last_answer.ok_or(last_error)
    }
}

impl DirectorySource for ChainedDirectory {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.sources.iter().any(|s| s.is_available())
    }

    fn resolve_principal(&self, id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError> {
        self.first_usable(
            "resolve_principal",
            |s| s.resolve_principal(id),
            |p| p.as_ref().map(|p| !p.name.is_empty()).unwrap_or(false),
        )
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError> {
        self.first_usable("group_members", |s| s.group_members(group_id), |m| !m.is_empty())
    }

    fn principal_groups(&self, id: &str) -> Result<Vec<String>, DirectoryError> {
        self.first_usable("principal_groups", |s| s.principal_groups(id), |g| !g.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        available: bool,
        members: Vec<DirectoryMember>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, available: bool, members: Vec<DirectoryMember>) -> Arc<Self> {
            Arc::new(Self {
                name,
                available,
                members,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl DirectorySource for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn is_available(&self) -> bool {
            self.available
        }
        fn resolve_principal(&self, _id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError> {
            Ok(None)
        }
        fn group_members(&self, _group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.members.clone())
        }
        fn principal_groups(&self, _id: &str) -> Result<Vec<String>, DirectoryError> {
            Ok(vec![])
        }
    }

    fn user(name: &str) -> DirectoryMember {
        DirectoryMember {
            id: Some(format!("S-1-5-21-{}", name.len())),
            name: name.to_string(),
            is_group: false,
            is_disabled: false,
        }
    }

    #[test]
    fn test_chain_uses_primary_when_it_answers() {
        let primary = Fixed::new("primary", true, vec![user("alice")]);
        let fallback = Fixed::new("fallback", true, vec![user("bob")]);
        let chain = ChainedDirectory::primary_with_fallback(primary.clone(), fallback.clone());

        let members = chain.group_members("S-1-5-21-900").unwrap();
        assert_eq!(members[0].name, "alice");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_chain_falls_back_on_unavailable_or_empty() {
        let down = Fixed::new("down", false, vec![user("alice")]);
        let fallback = Fixed::new("fallback", true, vec![user("bob")]);
        let chain = ChainedDirectory::primary_with_fallback(down.clone(), fallback);
        assert_eq!(chain.group_members("g").unwrap()[0].name, "bob");
        assert_eq!(down.calls.load(Ordering::SeqCst), 0);

        let empty = Fixed::new("empty", true, vec![]);
        let fallback = Fixed::new("fallback", true, vec![user("carol")]);
        let chain = ChainedDirectory::primary_with_fallback(empty, fallback);
        assert_eq!(chain.group_members("g").unwrap()[0].name, "carol");
    }

    #[test]
    fn test_chain_all_unavailable() {
        let chain = ChainedDirectory::new(vec![Arc::new(OfflineDirectory)]);
        assert!(!chain.is_available());
        assert_eq!(chain.group_members("g"), Err(DirectoryError::Unavailable));
    }

    #[test]
    fn test_chain_empty_answer_kept_as_last_resort() {
        let empty = Fixed::new("empty", true, vec![]);
        let chain = ChainedDirectory::new(vec![empty, Arc::new(OfflineDirectory)]);
        assert_eq!(chain.group_members("g"), Ok(vec![]));
    }
}
