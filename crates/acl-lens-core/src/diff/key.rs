use crate::model::{AccessDecision, AceEntry};
use crate::permissions::rights;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Value key describing one access-control fact for diffing.
///
/// Equality and hashing ignore case on the string fields and are exact on
/// everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclDiffKey {
    pub principal_id: String,
    pub decision: AccessDecision,
    pub mask: u32,
    pub inheritance_flags: String,
    pub propagation_flags: String,
    pub inherited: bool,
}

impl AclDiffKey {
    pub fn from_entry(entry: &AceEntry) -> Self {
        Self {
            principal_id: entry.principal_id.clone(),
            decision: entry.decision,
            mask: entry.mask,
            inheritance_flags: entry.inheritance_label(),
            propagation_flags: entry.propagation_label(),
            inherited: entry.inherited,
        }
    }

    /// The (principal, decision) pair used to correlate modified entries.
    pub fn correlation(&self) -> (String, AccessDecision) {
        (self.principal_id.to_lowercase(), self.decision)
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn hash_ignore_case<H: Hasher>(s: &str, state: &mut H) {
    for c in s.chars().flat_map(char::to_lowercase) {
        c.hash(state);
    }
    // field separator so ("ab", "c") and ("a", "bc") hash differently
    0xffu8.hash(state);
}

impl PartialEq for AclDiffKey {
    fn eq(&self, other: &Self) -> bool {
        self.decision == other.decision
            && self.mask == other.mask
            && self.inherited == other.inherited
            && eq_ignore_case(&self.principal_id, &other.principal_id)
            && eq_ignore_case(&self.inheritance_flags, &other.inheritance_flags)
            && eq_ignore_case(&self.propagation_flags, &other.propagation_flags)
    }
}

impl Eq for AclDiffKey {}

impl Hash for AclDiffKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_case(&self.principal_id, state);
        self.decision.hash(state);
        self.mask.hash(state);
        hash_ignore_case(&self.inheritance_flags, state);
        hash_ignore_case(&self.propagation_flags, state);
        self.inherited.hash(state);
    }
}

impl fmt::Display for AclDiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}",
            self.principal_id,
            self.decision,
            rights::summarize(self.mask),
            if self.inherited { " (inherited)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    fn key(id: &str, flags: &str) -> AclDiffKey {
        AclDiffKey {
            principal_id: id.to_string(),
            decision: AccessDecision::Allow,
            mask: rights::READ,
            inheritance_flags: flags.to_string(),
            propagation_flags: "None".to_string(),
            inherited: false,
        }
    }

    #[test]
    fn test_equality_ignores_case() {
        let a = key("S-1-5-21-1-1001", "ContainerInherit, ObjectInherit");
        let b = key("s-1-5-21-1-1001", "containerinherit, objectinherit");
        assert_eq!(a, b);

        let mut set = AHashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_any_field_difference_breaks_equality() {
        let base = key("S-1-5-21-1-1001", "None");
        let mut other = base.clone();
        other.mask = rights::MODIFY;
        assert_ne!(base, other);

        let mut other = base.clone();
        other.inherited = true;
        assert_ne!(base, other);

        let mut other = base.clone();
        other.decision = AccessDecision::Deny;
        assert_ne!(base, other);
    }
}
