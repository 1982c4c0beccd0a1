use super::sources::{AclSource, FolderLister};
use crate::config::ScanOptions;
use crate::error::{Error, SourceError};
use crate::groups::GroupExpander;
use crate::identity::classify::EVERYONE_SID;
use crate::identity::{DirectoryMember, PrincipalResolver, ResolvedPrincipal};
use crate::model::{
    AccessDecision, AceEntry, FolderDetail, PrincipalType, Provenance, RawAce, ScanError,
    ScanPhase, ScanResult, ScanStatus,
};
use crate::permissions::{intersect_masks, rights, AccessMap};
use crate::platform;
use crate::progress::{ProgressReporter, ScanProgress};
use ahash::{AHashMap, AHashSet};
use glob::Pattern;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Breadth-first ACL walk over one root.
///
/// All traversal state (queue, tree map, error list, expansion memo) lives
/// in a single `scan` call, so one scanner can be reused and scans never
/// share state.
pub struct TreeScanner<'a> {
    options: &'a ScanOptions,
    lister: &'a dyn FolderLister,
    acl_source: &'a dyn AclSource,
    resolver: &'a PrincipalResolver,
    expander: &'a GroupExpander,
    ignore_patterns: Vec<Pattern>,
}

/// Per-scan mutable state.
struct WalkState {
    result: ScanResult,
    queue: VecDeque<(String, usize)>,
    expanded: AHashMap<String, Vec<DirectoryMember>>,
    started: Instant,
}

impl WalkState {
    fn progress(&self) -> ScanProgress {
        ScanProgress {
            processed_folders: self.result.folders.len(),
            queued_folders: self.queue.len(),
            errors: self.result.errors.len(),
            elapsed: self.started.elapsed(),
        }
    }

    fn record_error(&mut self, path: &str, phase: ScanPhase, err: SourceError) {
        warn!("{:?} failed for {}: {}", phase, path, err);
        self.result.errors.push(ScanError {
            path: path.to_string(),
            phase,
            kind: err.kind,
            message: err.message,
        });
    }
}

impl<'a> TreeScanner<'a> {
    pub fn new(
        options: &'a ScanOptions,
        lister: &'a dyn FolderLister,
        acl_source: &'a dyn AclSource,
        resolver: &'a PrincipalResolver,
        expander: &'a GroupExpander,
    ) -> Self {
        let ignore_patterns = options
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            options,
            lister,
            acl_source,
            resolver,
            expander,
            ignore_patterns,
        }
    }

    /// Walk the tree from `options.root_path`.
    ///
    /// Per-folder failures are recorded and the walk continues. Only a
    /// missing root fails the call; cancellation returns the partial result
    /// with `ScanStatus::Cancelled`.
    pub fn scan(
        &self,
        reporter: &dyn ProgressReporter,
        cancel: &AtomicBool,
    ) -> Result<ScanResult, Error> {
        let root = self.options.root_path.clone();
        if root.is_empty() || !self.lister.is_folder(&root) {
            return Err(Error::InvalidRoot(root.into()));
        }

        let share = self.acl_source.share_acl(&root);
        if share.is_some() {
            debug!("Share layer present for {}", root);
        }

        let mut state = WalkState {
            result: ScanResult::new(root.clone()),
            queue: VecDeque::new(),
            expanded: AHashMap::new(),
            started: Instant::now(),
        };
        state.queue.push_back((root.clone(), 0));

        info!("Scanning ACLs under {}", root);
        reporter.on_scan_start(&root);

        while let Some((path, depth)) = state.queue.pop_front() {
            if cancel.load(Ordering::Relaxed) {
                state.result.status = ScanStatus::Cancelled;
                break;
            }

            if self.options.descends_from(depth) {
                self.enqueue_children(&mut state, &path, depth);
            }

            let mut detail = FolderDetail::new(path.clone(), depth);
            let outcome = self.capture_acl(&mut state, &mut detail, cancel);
            if let Some(share) = &share {
                detail.effective_entries = effective_entries(&detail, share);
            }
            state.result.push_folder(detail);
            reporter.on_folder_scanned(&state.progress(), &path);

            if let Err(Error::Cancelled) = outcome {
                state.result.status = ScanStatus::Cancelled;
                break;
            }
        }

        state.result.elapsed = state.started.elapsed();
        let progress = state.progress();
        let cancelled = state.result.was_cancelled();
        if cancelled {
            info!(
                "Scan cancelled after {} folders ({} still queued)",
                progress.processed_folders, progress.queued_folders
            );
        } else {
            info!(
                "Scan complete: {} folders, {} entries, {} errors in {:.2}s",
                progress.processed_folders,
                state.result.total_entries(),
                progress.errors,
                progress.elapsed.as_secs_f64()
            );
        }
        reporter.on_scan_complete(&progress, cancelled);

        Ok(state.result)
    }

    fn enqueue_children(&self, state: &mut WalkState, path: &str, depth: usize) {
        match self.lister.list_children(path) {
            Ok(children) => {
                let children: Vec<String> = children
                    .into_iter()
                    .filter(|child| !self.is_ignored(child))
                    .collect();
                for child in &children {
                    state.queue.push_back((child.clone(), depth + 1));
                }
                state.result.tree.insert(path.to_string(), children);
            }
            Err(err) => state.record_error(path, ScanPhase::Enumerate, err),
        }
    }

    fn is_ignored(&self, path: &str) -> bool {
        let name = platform::folder_name(path);
        self.ignore_patterns
            .iter()
            .any(|p| p.matches(name) || p.matches(path))
    }

    /// Read and record one folder's ACL. Returns `Err(Cancelled)` when the
    /// cancel flag trips part way; entries captured so far stay on `detail`.
    fn capture_acl(
        &self,
        state: &mut WalkState,
        detail: &mut FolderDetail,
        cancel: &AtomicBool,
    ) -> Result<(), Error> {
        let acl = match self.acl_source.read_acl(&detail.path) {
            Ok(acl) => acl,
            Err(err) => {
                detail.read_error = Some(err.message.clone());
                let path = detail.path.clone();
                state.record_error(&path, ScanPhase::ReadAcl, err);
                return Ok(());
            }
        };
        detail.inheritance_disabled = acl.protected;

        for raw in &acl.entries {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            if raw.inherited && !self.options.include_inherited {
                continue;
            }
            self.capture_entry(state, detail, raw, cancel)?;
        }
        Ok(())
    }

    fn capture_entry(
        &self,
        state: &mut WalkState,
        detail: &mut FolderDetail,
        raw: &RawAce,
        cancel: &AtomicBool,
    ) -> Result<(), Error> {
        let principal = self.principal_for(raw);
        if self.is_excluded(&principal) {
            debug!("Excluding {} on {}", principal.display_name, detail.path);
            return Ok(());
        }

        let mut entry = AceEntry {
            folder_path: detail.path.clone(),
            principal_name: principal.display_name.clone(),
            principal_id: principal.id.clone(),
            principal_type: if principal.is_group {
                PrincipalType::Group
            } else {
                PrincipalType::User
            },
            decision: raw.decision,
            rights: rights::summarize(raw.mask),
            mask: raw.mask,
            inherited: raw.inherited,
            inheritance_flags: raw.inheritance_flags,
            propagation_flags: raw.propagation_flags,
            provenance: Provenance::Direct,
            depth: detail.depth,
            disabled: principal.is_disabled,
            expanded_members: None,
        };

        if !(principal.is_group && self.options.expand_groups) {
            detail.push_entry(entry);
            return Ok(());
        }

        // The group's own entry stays on the folder even if expansion is cancelled.
        let index = detail.entries.len();
        detail.push_entry(entry.clone());
        let members = self.members_of(state, &principal.id, cancel)?;
        entry.expanded_members = Some(members.iter().map(|m| m.display()).collect());

        let synthetic: Vec<AceEntry> = members
            .iter()
            .map(|member| AceEntry {
                principal_name: member.name.clone(),
                principal_id: member.id.clone().unwrap_or_else(|| member.name.clone()),
                principal_type: PrincipalType::User,
                provenance: Provenance::ViaGroup(principal.display_name.clone()),
                disabled: member.is_disabled,
                expanded_members: None,
                ..entry.clone()
            })
            .collect();

        detail.entries[index] = entry;
        for member_entry in synthetic {
            detail.push_entry(member_entry);
        }
        Ok(())
    }

    fn principal_for(&self, raw: &RawAce) -> ResolvedPrincipal {
        let hint = raw.account_name.as_deref();
        if !self.options.resolve_identities {
            return PrincipalResolver::unresolved(&raw.principal_id, hint);
        }
        let resolved = self.resolver.resolve(&raw.principal_id);
        if resolved.display_name == resolved.id && hint.map(|h| !h.is_empty()).unwrap_or(false) {
            // resolver had nothing better than the raw identifier
            return PrincipalResolver::unresolved(&raw.principal_id, hint);
        }
        resolved
    }

    fn is_excluded(&self, principal: &ResolvedPrincipal) -> bool {
        (self.options.exclude_service_accounts && principal.is_service_account)
            || (self.options.exclude_admin_accounts && principal.is_admin_account)
    }

    /// Expanded members of a group, memoized for the rest of this scan and
    /// filtered by the account exclusion toggles.
    fn members_of(
        &self,
        state: &mut WalkState,
        group_id: &str,
        cancel: &AtomicBool,
    ) -> Result<Vec<DirectoryMember>, Error> {
        let key = group_id.to_lowercase();
        if let Some(members) = state.expanded.get(&key) {
            return Ok(members.clone());
        }

        let members: Vec<DirectoryMember> = self
            .expander
            .expand(group_id, cancel)?
            .into_iter()
            .filter(|m| {
                let principal = ResolvedPrincipal::classified(
                    m.id.as_deref().unwrap_or(""),
                    &m.name,
                    false,
                    m.is_disabled,
                );
                !self.is_excluded(&principal)
            })
            .collect();

        state.expanded.insert(key, members.clone());
        Ok(members)
    }
}

/// Intersect the folder's NTFS layer with the share layer, one allow entry
/// per principal with a non-zero effective mask. Grants and denies to
/// Everyone on the share apply to every principal.
pub fn effective_entries(detail: &FolderDetail, share: &[RawAce]) -> Vec<AceEntry> {
    let ntfs = AccessMap::build(detail.direct_entries(), true);
    let share_map = AccessMap::build(share, true);
    let everyone = share_map.get(EVERYONE_SID).copied().unwrap_or_default();

    let mut seen = AHashSet::new();
    let mut effective = Vec::new();

    for entry in detail.direct_entries() {
        if !seen.insert(entry.principal_id.to_lowercase()) {
            continue;
        }
        let own = share_map.get(&entry.principal_id).copied().unwrap_or_default();
        let share_mask = (own.allow | everyone.allow) & !(own.deny | everyone.deny);
        let mask = intersect_masks(ntfs.effective_mask(&entry.principal_id), share_mask, true);
        if mask == 0 {
            continue;
        }
        let all_inherited = detail
            .direct_entries()
            .filter(|e| e.principal_id.eq_ignore_ascii_case(&entry.principal_id))
            .all(|e| e.inherited);

        effective.push(AceEntry {
            decision: AccessDecision::Allow,
            rights: rights::summarize(mask),
            mask,
            inherited: all_inherited,
            expanded_members: None,
            ..entry.clone()
        });
    }
    effective
}
