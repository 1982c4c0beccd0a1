use crate::model::{AccessDecision, AceEntry, FolderDetail};
use crate::permissions::AccessRank;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_REASONS: usize = 3;

/// Coarse classification of how a folder compares with its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffStatus {
    Unknown,
    Same,
    DenyPresent,
    MorePermissive,
    MoreRestrictive,
    BrokenInheritance,
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiffStatus::Unknown => "Unknown",
            DiffStatus::Same => "Same",
            DiffStatus::DenyPresent => "Deny present",
            DiffStatus::MorePermissive => "More permissive",
            DiffStatus::MoreRestrictive => "More restrictive",
            DiffStatus::BrokenInheritance => "Inheritance broken",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentDiffExplanation {
    pub status: DiffStatus,
    pub reasons: Vec<String>,
}

impl ParentDiffExplanation {
    fn bare(status: DiffStatus) -> Self {
        Self {
            status,
            reasons: Vec::new(),
        }
    }
}

/// Score of one principal within one entry set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalScore {
    pub principal_id: String,
    pub name: String,
    pub rank: AccessRank,
    pub explicit_deny: bool,
}

impl PrincipalScore {
    /// An explicit deny collapses the score to zero whatever the allows say.
    pub fn score(&self) -> u8 {
        if self.explicit_deny {
            0
        } else {
            self.rank.score()
        }
    }
}

/// Per-principal scores in order of first appearance.
pub fn principal_scores<'a, I>(entries: I) -> Vec<PrincipalScore>
where
    I: IntoIterator<Item = &'a AceEntry>,
{
    let mut order: Vec<PrincipalScore> = Vec::new();
    let mut index: AHashMap<String, usize> = AHashMap::new();

    for entry in entries {
        let key = entry.principal_id.to_lowercase();
        let slot = *index.entry(key).or_insert_with(|| {
            order.push(PrincipalScore {
                principal_id: entry.principal_id.clone(),
                name: entry.principal_name.clone(),
                rank: AccessRank::None,
                explicit_deny: false,
            });
            order.len() - 1
        });
        let score = &mut order[slot];
        match entry.decision {
            AccessDecision::Allow => score.rank = score.rank.max(AccessRank::from_mask(entry.mask)),
            AccessDecision::Deny if !entry.inherited => score.explicit_deny = true,
            AccessDecision::Deny => {}
        }
    }
    order
}

fn scoring_entries(detail: &FolderDetail, use_effective: bool) -> Vec<&AceEntry> {
    if use_effective && !detail.effective_entries.is_empty() {
        detail.effective_entries.iter().collect()
    } else {
        detail.direct_entries().collect()
    }
}

/// Classify how `child` differs from `parent` and give up to three reasons.
///
/// Precedence: read error, root, explicit deny, any score increase, any
/// score decrease, blocked inheritance, otherwise unchanged.
pub fn explain(
    child: &FolderDetail,
    parent: Option<&FolderDetail>,
    use_effective: bool,
    is_root: bool,
    had_read_error: bool,
) -> ParentDiffExplanation {
    if had_read_error {
        return ParentDiffExplanation {
            status: DiffStatus::Unknown,
            reasons: vec!["Permissions could not be read".to_string()],
        };
    }
    if is_root {
        return ParentDiffExplanation::bare(DiffStatus::Same);
    }

    let child_scores = principal_scores(scoring_entries(child, use_effective));
    let parent_scores = parent
        .map(|p| principal_scores(scoring_entries(p, use_effective)))
        .unwrap_or_default();

    let parent_by_id: AHashMap<String, &PrincipalScore> = parent_scores
        .iter()
        .map(|s| (s.principal_id.to_lowercase(), s))
        .collect();
    let child_by_id: AHashMap<String, &PrincipalScore> = child_scores
        .iter()
        .map(|s| (s.principal_id.to_lowercase(), s))
        .collect();

    let mut increased = false;
    let mut decreased = false;
    let mut reasons = Vec::new();

    for score in &child_scores {
        let before = parent_by_id
            .get(&score.principal_id.to_lowercase())
            .map(|p| p.score())
            .unwrap_or(0);
        let after = score.score();
        if after > before {
            increased = true;
            push_reason(&mut reasons, increase_reason(score, before, after));
        } else if after < before {
            decreased = true;
            push_reason(&mut reasons, decrease_reason(score, before, after));
        }
    }

    for score in &parent_scores {
        if child_by_id.contains_key(&score.principal_id.to_lowercase()) {
            continue;
        }
        if score.score() > 0 {
            decreased = true;
            push_reason(
                &mut reasons,
                format!("{}: removed (was {})", score.name, AccessRank::from_score(score.score())),
            );
        }
    }

    let deny_present = child.direct_entries().any(|e| e.is_explicit_deny());

    if child.inheritance_disabled {
        push_reason(&mut reasons, "Inheritance is disabled on this folder".to_string());
    }
    if deny_present {
        push_reason(&mut reasons, "Explicit deny entries are present".to_string());
    }

    let status = if deny_present {
        DiffStatus::DenyPresent
    } else if increased {
        DiffStatus::MorePermissive
    } else if decreased {
        DiffStatus::MoreRestrictive
    } else if child.inheritance_disabled {
        DiffStatus::BrokenInheritance
    } else {
        DiffStatus::Same
    };

    ParentDiffExplanation { status, reasons }
}

fn push_reason(reasons: &mut Vec<String>, reason: String) {
    if reasons.len() < MAX_REASONS {
        reasons.push(reason);
    }
}

fn increase_reason(score: &PrincipalScore, before: u8, after: u8) -> String {
    let after = AccessRank::from_score(after);
    if before == 0 {
        format!("{}: granted {}", score.name, after)
    } else {
        format!(
            "{}: access increased from {} to {}",
            score.name,
            AccessRank::from_score(before),
            after
        )
    }
}

fn decrease_reason(score: &PrincipalScore, before: u8, after: u8) -> String {
    let before = AccessRank::from_score(before);
    if score.explicit_deny {
        format!("{}: denied (was {})", score.name, before)
    } else {
        format!(
            "{}: access reduced from {} to {}",
            score.name,
            before,
            AccessRank::from_score(after)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrincipalType, Provenance};
    use crate::permissions::rights::{FULL_CONTROL, MODIFY, READ, READ_AND_EXECUTE};
    use crate::permissions::{InheritanceFlags, PropagationFlags};

    fn ace(id: &str, decision: AccessDecision, mask: u32, inherited: bool) -> AceEntry {
        AceEntry {
            folder_path: String::new(),
            principal_name: format!("CORP\\{}", id),
            principal_id: id.to_string(),
            principal_type: PrincipalType::User,
            decision,
            rights: crate::permissions::rights::summarize(mask),
            mask,
            inherited,
            inheritance_flags: InheritanceFlags::BOTH,
            propagation_flags: PropagationFlags::NONE,
            provenance: Provenance::Direct,
            depth: 0,
            disabled: false,
            expanded_members: None,
        }
    }

    fn folder(entries: Vec<AceEntry>) -> FolderDetail {
        let mut detail = FolderDetail::new("x", 1);
        for e in entries {
            detail.push_entry(e);
        }
        detail
    }

    #[test]
    fn test_explicit_deny_zeroes_score() {
        let scores = principal_scores(&[
            ace("p", AccessDecision::Allow, FULL_CONTROL, false),
            ace("p", AccessDecision::Deny, READ, false),
        ]);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].rank, AccessRank::FullControl);
        assert_eq!(scores[0].score(), 0);
    }

    #[test]
    fn test_inherited_deny_does_not_zero_score() {
        let scores = principal_scores(&[
            ace("p", AccessDecision::Allow, MODIFY, false),
            ace("p", AccessDecision::Deny, READ, true),
        ]);
        assert_eq!(scores[0].score(), 2);
    }

    #[test]
    fn test_score_takes_max_allow_rank() {
        let scores = principal_scores(&[
            ace("p", AccessDecision::Allow, READ_AND_EXECUTE, true),
            ace("p", AccessDecision::Allow, MODIFY, false),
        ]);
        assert_eq!(scores[0].score(), 2);
    }

    #[test]
    fn test_reasons_are_capped() {
        let parent = folder(vec![]);
        let child = folder(vec![
            ace("a", AccessDecision::Allow, READ, false),
            ace("b", AccessDecision::Allow, READ, false),
            ace("c", AccessDecision::Allow, READ, false),
            ace("d", AccessDecision::Allow, READ, false),
        ]);
        let result = explain(&child, Some(&parent), false, false, false);
        assert_eq!(result.status, DiffStatus::MorePermissive);
        assert_eq!(result.reasons.len(), MAX_REASONS);
    }

    #[test]
    fn test_root_is_same() {
        let child = folder(vec![ace("a", AccessDecision::Deny, READ, false)]);
        let result = explain(&child, None, false, true, false);
        assert_eq!(result.status, DiffStatus::Same);
    }

    #[test]
    fn test_effective_layer_used_when_requested() {
        let parent = folder(vec![ace("p", AccessDecision::Allow, MODIFY, false)]);
        let mut child = folder(vec![ace("p", AccessDecision::Allow, MODIFY, true)]);
        child.effective_entries = vec![ace("p", AccessDecision::Allow, READ, true)];

        let raw = explain(&child, Some(&parent), false, false, false);
        assert_eq!(raw.status, DiffStatus::Same);

        let effective = explain(&child, Some(&parent), true, false, false);
        assert_eq!(effective.status, DiffStatus::MoreRestrictive);
    }
}
