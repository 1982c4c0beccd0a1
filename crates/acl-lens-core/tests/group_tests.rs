use acl_lens_core::error::DirectoryError;
use acl_lens_core::groups::{GroupExpander, GroupMembershipCache};
use acl_lens_core::identity::{
    DirectoryMember, DirectoryPrincipal, DirectorySource, IdentityCache, NoTranslation,
    PrincipalResolver,
};
use acl_lens_core::snapshot::SnapshotDocument;
use acl_lens_core::{AclSnapshot, AuditEngine, PlatformSources, ResolverBackend, ScanOptions};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn member(id: Option<&str>, name: &str, is_group: bool) -> DirectoryMember {
    DirectoryMember {
        id: id.map(str::to_string),
        name: name.to_string(),
        is_group,
        is_disabled: false,
    }
}

/// In-memory directory that counts member lookups.
struct CountingDirectory {
    available: bool,
    groups: Vec<(&'static str, Vec<DirectoryMember>)>,
    memberships: Vec<(&'static str, Vec<&'static str>)>,
    member_calls: AtomicUsize,
}

impl CountingDirectory {
    fn new(groups: Vec<(&'static str, Vec<DirectoryMember>)>) -> Self {
        Self {
            available: true,
            groups,
            memberships: Vec::new(),
            member_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }
}

impl DirectorySource for CountingDirectory {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn resolve_principal(&self, _id: &str) -> Result<Option<DirectoryPrincipal>, DirectoryError> {
        Ok(None)
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(DirectoryError::Unavailable);
        }
        Ok(self
            .groups
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(group_id))
            .map(|(_, members)| members.clone())
            .unwrap_or_default())
    }

    fn principal_groups(&self, id: &str) -> Result<Vec<String>, DirectoryError> {
        if !self.available {
            return Err(DirectoryError::Unavailable);
        }
        Ok(self
            .memberships
            .iter()
            .find(|(user, _)| user.eq_ignore_ascii_case(id))
            .map(|(_, groups)| groups.iter().map(|g| g.to_string()).collect())
            .unwrap_or_default())
    }
}

fn expander(directory: Arc<CountingDirectory>) -> GroupExpander {
    GroupExpander::new(Arc::new(GroupMembershipCache::default()), directory)
}

#[test]
fn test_cycle_terminates_with_distinct_members() {
    let directory = Arc::new(CountingDirectory::new(vec![
        ("G1", vec![member(Some("U1"), "u1", false), member(Some("G2"), "g2", true)]),
        (
            "G2",
            vec![
                member(Some("U2"), "u2", false),
                member(Some("u1"), "u1", false),
                member(Some("G1"), "g1", true),
            ],
        ),
    ]));
    let expander = expander(directory.clone());

    let members = expander.expand("G1", &AtomicBool::new(false)).unwrap();
    let ids: Vec<_> = members.iter().filter_map(|m| m.id.clone()).collect();
    assert_eq!(ids, vec!["U1".to_string(), "U2".to_string()]);
    assert_eq!(directory.calls(), 2);
}

#[test]
fn test_nameless_members_dedup_by_name() {
    let directory = Arc::new(CountingDirectory::new(vec![(
        "G",
        vec![
            member(None, "contractor", false),
            member(None, "CONTRACTOR", false),
            member(None, "orphan-group", true),
        ],
    )]));
    let members = expander(directory)
        .expand("G", &AtomicBool::new(false))
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "contractor");
}

#[test]
fn test_untrusted_cache_entry_is_refetched() {
    let directory = Arc::new(CountingDirectory::new(vec![(
        "G",
        vec![member(None, "nested", true), member(Some("U"), "u", false)],
    )]));
    let expander = expander(directory.clone());

    expander.direct_members("G");
    expander.direct_members("G");
    // the cached list holds a group member without an id, so it is never served
    assert_eq!(directory.calls(), 2);
}

#[test]
fn test_trusted_cache_entry_is_served_until_expiry() {
    let directory = Arc::new(CountingDirectory::new(vec![(
        "G",
        vec![member(Some("U"), "u", false)],
    )]));
    let cached = GroupExpander::new(Arc::new(GroupMembershipCache::default()), directory.clone());
    cached.direct_members("G");
    cached.direct_members("g");
    assert_eq!(directory.calls(), 1);

    let expired = GroupExpander::new(Arc::new(GroupMembershipCache::new(Duration::ZERO)), directory.clone());
    expired.direct_members("G");
    expired.direct_members("G");
    assert_eq!(directory.calls(), 3);
}

#[test]
fn test_unavailable_directory_yields_empty_expansion() {
    let mut directory = CountingDirectory::new(vec![("G", vec![member(Some("U"), "u", false)])]);
    directory.available = false;
    let expander = expander(Arc::new(directory));

    let members = expander.expand("G", &AtomicBool::new(false)).unwrap();
    assert!(members.is_empty());
    assert!(!expander.is_privileged_user("U"));
}

#[test]
fn test_expansion_honours_cancel() {
    let directory = Arc::new(CountingDirectory::new(vec![]));
    let result = expander(directory).expand("G", &AtomicBool::new(true));
    assert!(matches!(result, Err(acl_lens_core::Error::Cancelled)));
}

#[test]
fn test_privileged_user() {
    let mut directory = CountingDirectory::new(vec![]);
    directory.memberships = vec![
        ("ADMIN1", vec!["Staff", "Domain Admins"]),
        ("USER1", vec!["Staff"]),
    ];
    let expander = expander(Arc::new(directory));

    assert!(expander.is_privileged_user("admin1"));
    assert!(!expander.is_privileged_user("USER1"));
    assert!(!expander.is_privileged_user("nobody"));
}

fn snapshot_sources(available: bool) -> PlatformSources {
    let doc: SnapshotDocument = serde_json::from_value(json!({
        "directory_available": available,
        "folders": [{ "path": "/srv/share" }],
        "principals": [
            { "id": "G-OPS", "name": "CORP\\Ops", "is_group": true,
              "members": ["U-BOB", "G-ONCALL"] },
            { "id": "G-ONCALL", "name": "CORP\\OnCall", "is_group": true,
              "members": ["U-EVE", "G-OPS"] },
            { "id": "U-BOB", "name": "CORP\\bob", "groups": ["Backup Operators"] },
            { "id": "U-EVE", "name": "CORP\\eve", "is_disabled": true }
        ]
    }))
    .unwrap();
    PlatformSources::from_snapshot(Arc::new(AclSnapshot::new(doc).unwrap()))
}

#[test]
fn test_engine_expansion_through_snapshot_directory() {
    let engine = AuditEngine::new(ScanOptions::new("/srv/share"), snapshot_sources(true));

    let members = engine.expand_group("G-OPS").unwrap();
    let display: Vec<_> = members.iter().map(|m| m.display()).collect();
    assert_eq!(display, vec![r"CORP\bob", r"CORP\eve (disabled)"]);
    assert!(engine.is_privileged_user("U-BOB"));
    assert!(!engine.is_privileged_user("U-EVE"));
    assert_eq!(engine.group_cache().len(), 2);
}

#[test]
fn test_engine_offline_snapshot_directory() {
    let engine = AuditEngine::new(ScanOptions::new("/srv/share"), snapshot_sources(false));
    assert!(!engine.directory_available());
    assert!(engine.expand_group("G-OPS").unwrap().is_empty());

    // OS translation still names the principal
    let bob = engine.resolve("U-BOB");
    assert_eq!(bob.display_name, r"CORP\bob");
}

#[test]
fn test_local_only_backend_skips_directory() {
    let options = ScanOptions {
        resolver_backend: ResolverBackend::LocalOnly,
        ..ScanOptions::new("/srv/share")
    };
    let engine = AuditEngine::new(options, snapshot_sources(true));
    assert!(!engine.directory_available());

    let eve = engine.resolve("U-EVE");
    assert_eq!(eve.display_name, r"CORP\eve");
    // disabled state only comes from the directory
    assert!(!eve.is_disabled);
}

#[test]
fn test_resolver_falls_back_to_raw_id_without_caching() {
    let cache = Arc::new(IdentityCache::new());
    let resolver = PrincipalResolver::new(
        cache.clone(),
        Arc::new(NoTranslation),
        Arc::new(CountingDirectory::new(vec![])),
    );

    let unknown = resolver.resolve("S-1-5-21-9-9-9-1001");
    assert_eq!(unknown.display_name, "S-1-5-21-9-9-9-1001");
    assert!(cache.is_empty());

    let everyone = resolver.resolve("S-1-1-0");
    assert!(everyone.is_group);
}
