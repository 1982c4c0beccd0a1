use crate::config::{ResolverBackend, ScanOptions};
use crate::diff::{self, BaselineSnapshot, ParentDiffExplanation};
use crate::error::Error;
use crate::groups::{GroupExpander, GroupMembershipCache};
use crate::identity::{
    ChainedDirectory, DirectoryMember, DirectorySource, IdentityCache, NameTranslator,
    NoTranslation, OfflineDirectory, PrincipalResolver, ResolvedPrincipal,
};
use crate::model::ScanResult;
use crate::platform;
use crate::progress::ProgressReporter;
use crate::scanner::{AclSource, FolderLister, FsLister, ModeBitsAcl, TreeScanner};
use crate::snapshot::AclSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The platform services the engine reads from.
#[derive(Clone)]
pub struct PlatformSources {
    pub lister: Arc<dyn FolderLister>,
    pub acl: Arc<dyn AclSource>,
    pub translator: Arc<dyn NameTranslator>,
    pub primary_directory: Option<Arc<dyn DirectorySource>>,
    pub fallback_directory: Option<Arc<dyn DirectorySource>>,
}

impl PlatformSources {
    /// Local filesystem walk with the given ACL source and no directory.
    pub fn filesystem(acl: Arc<dyn AclSource>) -> Self {
        Self {
            lister: Arc::new(FsLister),
            acl,
            translator: Arc::new(NoTranslation),
            primary_directory: None,
            fallback_directory: None,
        }
    }

    /// Local filesystem walk reading permission bits.
    pub fn local() -> Self {
        Self::filesystem(Arc::new(ModeBitsAcl))
    }

    /// Every source served from one offline snapshot.
    pub fn from_snapshot(snapshot: Arc<AclSnapshot>) -> Self {
        Self {
            lister: snapshot.clone(),
            acl: snapshot.clone(),
            translator: snapshot.clone(),
            primary_directory: Some(snapshot),
            fallback_directory: None,
        }
    }

    pub fn with_directories(
        mut self,
        primary: Option<Arc<dyn DirectorySource>>,
        fallback: Option<Arc<dyn DirectorySource>>,
    ) -> Self {
        self.primary_directory = primary;
        self.fallback_directory = fallback;
        self
    }
}

/// Assemble the directory chain the resolver and expander use.
fn build_directory(backend: ResolverBackend, sources: &PlatformSources) -> Arc<dyn DirectorySource> {
    let chosen: Vec<Arc<dyn DirectorySource>> = match backend {
        ResolverBackend::Auto => sources
            .primary_directory
            .iter()
            .chain(sources.fallback_directory.iter())
            .cloned()
            .collect(),
        ResolverBackend::Primary => sources.primary_directory.iter().cloned().collect(),
        ResolverBackend::Fallback => sources.fallback_directory.iter().cloned().collect(),
        ResolverBackend::LocalOnly => Vec::new(),
    };

    if chosen.is_empty() {
        debug!("No directory source for backend {:?}", backend);
        return Arc::new(OfflineDirectory);
    }
    Arc::new(ChainedDirectory::new(chosen))
}

pub struct AuditEngine {
    options: ScanOptions,
    sources: PlatformSources,
    directory: Arc<dyn DirectorySource>,
    resolver: PrincipalResolver,
    expander: GroupExpander,
    cancel_token: Arc<AtomicBool>,
}

impl AuditEngine {
    pub fn new(options: ScanOptions, sources: PlatformSources) -> Self {
        Self::with_caches(
            options,
            sources,
            Arc::new(IdentityCache::new()),
            Arc::new(GroupMembershipCache::default()),
        )
    }

    /// Build an engine around caches shared with other engines or with
    /// interactive lookups.
    pub fn with_caches(
        options: ScanOptions,
        sources: PlatformSources,
        identity_cache: Arc<IdentityCache>,
        group_cache: Arc<GroupMembershipCache>,
    ) -> Self {
        let directory = build_directory(options.resolver_backend, &sources);
        let resolver =
            PrincipalResolver::new(identity_cache, sources.translator.clone(), directory.clone());
        let expander = GroupExpander::new(group_cache, directory.clone());
        Self {
            options,
            sources,
            directory,
            resolver,
            expander,
            cancel_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_revalidation(mut self, revalidate: bool) -> Self {
        self.resolver = self.resolver.with_revalidation(revalidate);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn identity_cache(&self) -> &Arc<IdentityCache> {
        self.resolver.cache()
    }

    pub fn group_cache(&self) -> &Arc<GroupMembershipCache> {
        self.expander.cache()
    }

    pub fn directory_available(&self) -> bool {
        self.directory.is_available()
    }

    /// Shared flag; storing `true` stops a running scan at the next folder or ACE.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel_token.clone()
    }

    /// Walk the tree, then compute every folder's parent diff.
    ///
    /// The cancel token is reset when the scan starts. A cancelled scan
    /// returns its partial result with `ScanStatus::Cancelled` and no diffs.
    pub fn scan(&self, reporter: &dyn ProgressReporter) -> Result<ScanResult, Error> {
        self.cancel_token.store(false, Ordering::Relaxed);

        let scanner = TreeScanner::new(
            &self.options,
            self.sources.lister.as_ref(),
            self.sources.acl.as_ref(),
            &self.resolver,
            &self.expander,
        );
        let mut result = scanner.scan(reporter, &self.cancel_token)?;

        if !result.was_cancelled() {
            let diff_start = Instant::now();
            diff::compute_parent_diffs(&mut result);
            reporter.on_diff_complete(result.folders.len(), diff_start.elapsed().as_secs_f64());
        }
        Ok(result)
    }

    /// Populate each folder's parent diff in place.
    pub fn compute_diffs(&self, result: &mut ScanResult) {
        diff::compute_parent_diffs(result);
    }

    pub fn apply_baseline(&self, result: &mut ScanResult, baseline: &BaselineSnapshot) {
        info!(
            "Comparing {} folders against baseline from {}",
            result.folders.len(),
            baseline.captured_at
        );
        diff::apply_baseline(result, baseline);
    }

    /// Explain how the folder at `path` differs from its parent.
    pub fn explain(
        &self,
        result: &ScanResult,
        path: &str,
        use_effective: bool,
    ) -> Option<ParentDiffExplanation> {
        let child = result.folder(path)?;
        let parent = platform::parent_folder(path).and_then(|p| result.folder(p));
        Some(diff::explain(
            child,
            parent,
            use_effective,
            result.is_root(path),
            child.had_read_error(),
        ))
    }

    pub fn resolve(&self, id: &str) -> ResolvedPrincipal {
        self.resolver.resolve(id)
    }

    /// On-demand transitive expansion, independent of any scan.
    pub fn expand_group(&self, group_id: &str) -> Result<Vec<DirectoryMember>, Error> {
        self.expand_group_with_cancel(group_id, &AtomicBool::new(false))
    }

    pub fn expand_group_with_cancel(
        &self,
        group_id: &str,
        cancel: &AtomicBool,
    ) -> Result<Vec<DirectoryMember>, Error> {
        self.expander.expand(group_id, cancel)
    }

    pub fn is_privileged_user(&self, user_id: &str) -> bool {
        self.expander.is_privileged_user(user_id)
    }
}
