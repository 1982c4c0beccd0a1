use crate::error::Error;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

const CACHE_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIdentity {
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_disabled: bool,
}

/// On-disk shape. Older builds wrote a bare `{ "id": "name" }` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Current {
        version: u32,
        entries: BTreeMap<String, StoredIdentity>,
    },
    Legacy(BTreeMap<String, String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIdentity {
    Full(CachedIdentity),
    NameOnly(String),
}

impl From<StoredIdentity> for CachedIdentity {
    fn from(stored: StoredIdentity) -> Self {
        match stored {
            StoredIdentity::Full(identity) => identity,
            StoredIdentity::NameOnly(name) => CachedIdentity {
                name,
                is_group: false,
                is_disabled: false,
            },
        }
    }
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    entries: BTreeMap<&'a str, &'a CachedIdentity>,
}

/// Durable identifier → identity map shared by scans and interactive lookups.
/// Keys are compared case-insensitively.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: DashMap<String, CachedIdentity>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<CachedIdentity> {
        self.entries.get(&cache_key(id)).map(|e| e.value().clone())
    }

    pub fn insert(&self, id: &str, identity: CachedIdentity) {
        self.entries.insert(cache_key(id), identity);
    }

    pub fn set_disabled(&self, id: &str, is_disabled: bool) {
        if let Some(mut entry) = self.entries.get_mut(&cache_key(id)) {
            entry.is_disabled = is_disabled;
        }
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

    /// Load a cache file; a missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No identity cache at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(err) => return Err(err.into()),
        };
        let cache = Self::from_json(&data)?;
        info!("Loaded {} cached identities from {}", cache.len(), path.display());
        Ok(cache)
    }

    pub fn from_json(data: &str) -> Result<Self, Error> {
        let cache = Self::new();
        match serde_json::from_str::<StoredDocument>(data)? {
            StoredDocument::Current { version, entries } => {
                if version > CACHE_FORMAT_VERSION {
                    return Err(Error::Cache(format!(
                        "identity cache version {} is newer than supported {}",
                        version, CACHE_FORMAT_VERSION
                    )));
                }
                for (id, stored) in entries {
                    cache.insert(&id, stored.into());
                }
            }
            StoredDocument::Legacy(entries) => {
                debug!("Reading legacy name-only identity cache");
                for (id, name) in entries {
                    cache.insert(&id, StoredIdentity::NameOnly(name).into());
                }
            }
        }
        Ok(cache)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        let snapshot: Vec<(String, CachedIdentity)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let doc = DocumentRef {
            version: CACHE_FORMAT_VERSION,
            entries: snapshot.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Write the cache, replacing the file atomically via a sibling temp file.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;
        debug!("Saved {} cached identities to {}", self.len(), path.display());
        Ok(())
    }
}

fn cache_key(id: &str) -> String {
    id.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, is_group: bool) -> CachedIdentity {
        CachedIdentity {
            name: name.to_string(),
            is_group,
            is_disabled: false,
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cache = IdentityCache::new();
        cache.insert("s-1-5-21-1-1001", identity(r"CORP\jdoe", false));
        assert_eq!(cache.get("S-1-5-21-1-1001").unwrap().name, r"CORP\jdoe");
    }

    #[test]
    fn test_legacy_document_loads_as_plain_users() {
        let cache = IdentityCache::from_json(
            r#"{ "S-1-5-21-1-1001": "CORP\\jdoe", "S-1-5-21-1-1002": "CORP\\Finance" }"#,
        )
        .unwrap();
        assert_eq!(cache.len(), 2);
        let finance = cache.get("S-1-5-21-1-1002").unwrap();
        assert_eq!(finance.name, r"CORP\Finance");
        assert!(!finance.is_group);
        assert!(!finance.is_disabled);
    }

    #[test]
    fn test_current_document_round_trip_keeps_flags() {
        let cache = IdentityCache::new();
        cache.insert("S-1-5-21-1-2000", identity(r"CORP\Finance", true));
        cache.insert("S-1-5-21-1-2001", identity(r"CORP\old", false));
        cache.set_disabled("S-1-5-21-1-2001", true);

        let reloaded = IdentityCache::from_json(&cache.to_json().unwrap()).unwrap();
        assert!(reloaded.get("S-1-5-21-1-2000").unwrap().is_group);
        assert!(reloaded.get("S-1-5-21-1-2001").unwrap().is_disabled);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let result = IdentityCache::from_json(r#"{ "version": 99, "entries": {} }"#);
        assert!(matches!(result, Err(Error::Cache(_))));
    }
}
