use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which directory sources the principal resolver consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverBackend {
    /// Primary source first, fallback source when it is unavailable or empty.
    #[default]
    Auto,
    Primary,
    Fallback,
    /// OS name translation only, no directory lookups.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub root_path: String,
    /// `None` scans every depth; `Some(0)` scans the root alone.
    pub max_depth: Option<usize>,
    pub include_inherited: bool,
    pub resolve_identities: bool,
    pub expand_groups: bool,
    pub exclude_service_accounts: bool,
    pub exclude_admin_accounts: bool,
    pub resolver_backend: ResolverBackend,
    /// Glob patterns for folders to skip.
    pub ignore_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root_path: String::new(),
            max_depth: None,
            include_inherited: true,
            resolve_identities: true,
            expand_groups: false,
            exclude_service_accounts: false,
            exclude_admin_accounts: false,
            resolver_backend: ResolverBackend::Auto,
            ignore_patterns: Vec::new(),
        }
    }
}

impl ScanOptions {
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Default::default()
        }
    }

    /// Whether a folder at `depth` gets its children enumerated.
    pub fn descends_from(&self, depth: usize) -> bool {
        self.max_depth.map(|max| depth < max).unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub identity_cache_path: String,
    pub group_cache_ttl_secs: u64,
    pub revalidate_cached_users: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            identity_cache_path: "identity_cache.json".to_string(),
            group_cache_ttl_secs: 900,
            revalidate_cached_users: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanOptions,
    pub cache: CacheSettings,
}

/// Load `AclLens.toml` from the working directory (optional) overlaid by
/// `ACL_LENS__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(ConfigFile::with_name("AclLens").required(false))
        .add_source(Environment::with_prefix("ACL_LENS").separator("__"))
        .build()?
        .try_deserialize::<AppConfig>()
}

/// Load configuration from an explicit file.
pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(ConfigFile::from(path))
        .build()?
        .try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ScanOptions::default();
        assert!(options.include_inherited);
        assert!(options.resolve_identities);
        assert!(!options.expand_groups);
        assert_eq!(options.resolver_backend, ResolverBackend::Auto);
        assert!(options.descends_from(1000));
    }

    #[test]
    fn test_depth_limit() {
        let options = ScanOptions {
            max_depth: Some(1),
            ..ScanOptions::new("/srv")
        };
        assert!(options.descends_from(0));
        assert!(!options.descends_from(1));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AclLens.toml");
        std::fs::write(
            &path,
            r#"
[scan]
root_path = 'D:\Shares'
max_depth = 3
expand_groups = true
resolver_backend = "local-only"

[cache]
group_cache_ttl_secs = 60
"#,
        )
        .unwrap();

        let config = load_configuration_from(&path).unwrap();
        assert_eq!(config.scan.root_path, r"D:\Shares");
        assert_eq!(config.scan.max_depth, Some(3));
        assert!(config.scan.expand_groups);
        assert!(config.scan.include_inherited);
        assert_eq!(config.scan.resolver_backend, ResolverBackend::LocalOnly);
        assert_eq!(config.cache.group_cache_ttl_secs, 60);
        assert_eq!(config.cache.identity_cache_path, "identity_cache.json");
    }
}
