//! NTFS rights catalogue, rights-summary normalization and access ranking.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const LIST_DIRECTORY: u32 = 0x0000_0001;
pub const CREATE_FILES: u32 = 0x0000_0002;
pub const CREATE_DIRECTORIES: u32 = 0x0000_0004;
pub const READ_EXTENDED_ATTRIBUTES: u32 = 0x0000_0008;
pub const WRITE_EXTENDED_ATTRIBUTES: u32 = 0x0000_0010;
pub const TRAVERSE: u32 = 0x0000_0020;
pub const DELETE_SUBDIRECTORIES_AND_FILES: u32 = 0x0000_0040;
pub const READ_ATTRIBUTES: u32 = 0x0000_0080;
pub const WRITE_ATTRIBUTES: u32 = 0x0000_0100;
pub const DELETE: u32 = 0x0001_0000;
pub const READ_PERMISSIONS: u32 = 0x0002_0000;
pub const CHANGE_PERMISSIONS: u32 = 0x0004_0000;
pub const TAKE_OWNERSHIP: u32 = 0x0008_0000;
pub const SYNCHRONIZE: u32 = 0x0010_0000;

pub const READ: u32 = LIST_DIRECTORY | READ_EXTENDED_ATTRIBUTES | READ_ATTRIBUTES | READ_PERMISSIONS;
pub const READ_AND_EXECUTE: u32 = READ | TRAVERSE;
pub const WRITE: u32 =
    CREATE_FILES | CREATE_DIRECTORIES | WRITE_EXTENDED_ATTRIBUTES | WRITE_ATTRIBUTES;
pub const MODIFY: u32 = READ_AND_EXECUTE | WRITE | DELETE;
pub const FULL_CONTROL: u32 = MODIFY
    | DELETE_SUBDIRECTORIES_AND_FILES
    | CHANGE_PERMISSIONS
    | TAKE_OWNERSHIP
    | SYNCHRONIZE;

pub const GENERIC_ALL: u32 = 0x1000_0000;
pub const GENERIC_EXECUTE: u32 = 0x2000_0000;
pub const GENERIC_WRITE: u32 = 0x4000_0000;
pub const GENERIC_READ: u32 = 0x8000_0000;

const GENERIC_MASK: u32 = GENERIC_ALL | GENERIC_EXECUTE | GENERIC_WRITE | GENERIC_READ;

/// Named rights in decomposition order. Composites come first so that a
/// mask is described by the broadest names that cover it.
const CATALOGUE: &[(&str, u32)] = &[
    ("FullControl", FULL_CONTROL & !SYNCHRONIZE),
    ("Modify", MODIFY),
    ("ReadAndExecute", READ_AND_EXECUTE),
    ("Read", READ),
    ("Write", WRITE),
    ("Delete", DELETE),
    ("DeleteSubdirectoriesAndFiles", DELETE_SUBDIRECTORIES_AND_FILES),
    ("ChangePermissions", CHANGE_PERMISSIONS),
    ("TakeOwnership", TAKE_OWNERSHIP),
    ("ReadPermissions", READ_PERMISSIONS),
    ("ListDirectory", LIST_DIRECTORY),
    ("Traverse", TRAVERSE),
    ("CreateFiles", CREATE_FILES),
    ("CreateDirectories", CREATE_DIRECTORIES),
    ("ReadAttributes", READ_ATTRIBUTES),
    ("WriteAttributes", WRITE_ATTRIBUTES),
    ("ReadExtendedAttributes", READ_EXTENDED_ATTRIBUTES),
    ("WriteExtendedAttributes", WRITE_EXTENDED_ATTRIBUTES),
];

/// Replace generic access bits with the file-system rights they map to.
pub fn expand_generic(mask: u32) -> u32 {
    let mut expanded = mask & !GENERIC_MASK;
    if mask & GENERIC_ALL != 0 {
        expanded |= FULL_CONTROL;
    }
    if mask & GENERIC_READ != 0 {
        expanded |= READ | SYNCHRONIZE;
    }
    if mask & GENERIC_WRITE != 0 {
        expanded |= WRITE | SYNCHRONIZE;
    }
    if mask & GENERIC_EXECUTE != 0 {
        expanded |= TRAVERSE | READ_ATTRIBUTES | READ_PERMISSIONS | SYNCHRONIZE;
    }
    expanded
}

/// Describe a mask as a deterministic, comma-joined list of right names.
///
/// Unknown leftover bits add `Custom`; a mask with nothing but
/// `Synchronize` (or nothing at all) is `None`.
pub fn summarize(mask: u32) -> String {
    names_for(mask).join(", ")
}

pub fn names_for(mask: u32) -> Vec<&'static str> {
    let mut remaining = expand_generic(mask) & !SYNCHRONIZE;
    let mut names = Vec::new();

    for (name, bits) in CATALOGUE {
        if remaining & bits == *bits {
            names.push(*name);
            remaining &= !bits;
        }
    }

    if remaining != 0 {
        names.push("Custom");
    }
    if names.is_empty() {
        names.push("None");
    }
    names
}

/// Four-level coarse access rank used when scoring principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessRank {
    None = 0,
    Read = 1,
    Modify = 2,
    FullControl = 3,
}

impl AccessRank {
    pub fn from_mask(mask: u32) -> Self {
        let mask = expand_generic(mask) & !SYNCHRONIZE;
        if mask & (FULL_CONTROL & !SYNCHRONIZE) == FULL_CONTROL & !SYNCHRONIZE {
            AccessRank::FullControl
        } else if mask & MODIFY == MODIFY {
            AccessRank::Modify
        } else if mask & (READ_AND_EXECUTE | WRITE) != 0 {
            AccessRank::Read
        } else {
            AccessRank::None
        }
    }

    pub fn score(self) -> u8 {
        self as u8
    }

    pub fn from_score(score: u8) -> Self {
        match score {
            0 => AccessRank::None,
            1 => AccessRank::Read,
            2 => AccessRank::Modify,
            _ => AccessRank::FullControl,
        }
    }
}

impl fmt::Display for AccessRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccessRank::None => "None",
            AccessRank::Read => "Read",
            AccessRank::Modify => "Modify",
            AccessRank::FullControl => "FullControl",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_composites() {
        assert_eq!(summarize(FULL_CONTROL), "FullControl");
        assert_eq!(summarize(MODIFY | SYNCHRONIZE), "Modify");
        assert_eq!(summarize(READ_AND_EXECUTE | SYNCHRONIZE), "ReadAndExecute");
        assert_eq!(summarize(READ | WRITE), "Read, Write");
    }

    #[test]
    fn test_summarize_empty_and_custom() {
        assert_eq!(summarize(0), "None");
        assert_eq!(summarize(SYNCHRONIZE), "None");
        assert_eq!(summarize(READ | 0x0000_0200), "Read, Custom");
    }

    #[test]
    fn test_generic_rights_expand() {
        assert_eq!(summarize(GENERIC_ALL), "FullControl");
        assert_eq!(summarize(GENERIC_READ), "Read");
        assert_eq!(AccessRank::from_mask(GENERIC_ALL), AccessRank::FullControl);
    }

    #[test]
    fn test_rank_levels() {
        assert_eq!(AccessRank::from_mask(0), AccessRank::None);
        assert_eq!(AccessRank::from_mask(LIST_DIRECTORY), AccessRank::Read);
        assert_eq!(AccessRank::from_mask(READ_AND_EXECUTE), AccessRank::Read);
        assert_eq!(AccessRank::from_mask(MODIFY), AccessRank::Modify);
        assert_eq!(AccessRank::from_mask(FULL_CONTROL), AccessRank::FullControl);
        assert_eq!(AccessRank::from_mask(SYNCHRONIZE), AccessRank::None);
    }
}
