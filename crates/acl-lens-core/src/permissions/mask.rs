use crate::model::AccessDecision;
use crate::permissions::rights;
use ahash::AHashMap;

/// Anything that contributes an allow or deny mask for one principal.
pub trait PermissionEntry {
    fn principal_id(&self) -> &str;
    fn decision(&self) -> AccessDecision;
    fn mask(&self) -> u32;
    fn is_inherited(&self) -> bool;
}

/// Allow and deny bits accumulated for one principal within one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessAccumulator {
    pub allow: u32,
    pub deny: u32,
}

impl AccessAccumulator {
    /// Deny wins over allow within the same layer.
    pub fn effective(&self) -> u32 {
        self.allow & !self.deny
    }
}

/// Per-principal accumulators keyed by lower-cased principal identifier.
#[derive(Debug, Clone, Default)]
pub struct AccessMap {
    entries: AHashMap<String, AccessAccumulator>,
}

impl AccessMap {
    /// Fold entries into allow/deny accumulators, skipping inherited entries
    /// unless `include_inherited` is set.
    pub fn build<'a, E, I>(entries: I, include_inherited: bool) -> Self
    where
        E: PermissionEntry + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        let mut map = AccessMap::default();
        for entry in entries {
            if entry.is_inherited() && !include_inherited {
                continue;
            }
            let mask = rights::expand_generic(entry.mask());
            let acc = map
                .entries
                .entry(principal_key(entry.principal_id()))
                .or_default();
            match entry.decision() {
                AccessDecision::Allow => acc.allow |= mask,
                AccessDecision::Deny => acc.deny |= mask,
            }
        }
        map
    }

    pub fn get(&self, principal_id: &str) -> Option<&AccessAccumulator> {
        self.entries.get(&principal_key(principal_id))
    }

    /// `allow & !deny` for the principal, zero when it has no entries.
    pub fn effective_mask(&self, principal_id: &str) -> u32 {
        self.get(principal_id).map(|acc| acc.effective()).unwrap_or(0)
    }

    pub fn principals(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Combine two stacked permission layers. With a second layer present the
/// most restrictive wins (bitwise AND); without one the first layer passes
/// through unchanged.
pub fn intersect_masks(ntfs_mask: u32, share_mask: u32, has_share: bool) -> u32 {
    if has_share {
        ntfs_mask & share_mask
    } else {
        ntfs_mask
    }
}

fn principal_key(id: &str) -> String {
    id.to_lowercase()
}
