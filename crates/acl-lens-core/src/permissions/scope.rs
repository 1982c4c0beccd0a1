use serde::{Deserialize, Serialize};

/// Raw inheritance bits of an ACE (`ContainerInherit` = 1, `ObjectInherit` = 2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InheritanceFlags(pub u8);

impl InheritanceFlags {
    pub const NONE: Self = Self(0);
    pub const CONTAINER_INHERIT: Self = Self(1);
    pub const OBJECT_INHERIT: Self = Self(2);
    pub const BOTH: Self = Self(3);

    pub fn container_inherit(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn object_inherit(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn label(self) -> String {
        let mut parts = Vec::new();
        if self.container_inherit() {
            parts.push("ContainerInherit");
        }
        if self.object_inherit() {
            parts.push("ObjectInherit");
        }
        join_or_none(parts)
    }
}

/// Raw propagation bits of an ACE (`NoPropagateInherit` = 1, `InheritOnly` = 2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropagationFlags(pub u8);

impl PropagationFlags {
    pub const NONE: Self = Self(0);
    pub const NO_PROPAGATE_INHERIT: Self = Self(1);
    pub const INHERIT_ONLY: Self = Self(2);

    pub fn no_propagate(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn inherit_only(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn label(self) -> String {
        let mut parts = Vec::new();
        if self.no_propagate() {
            parts.push("NoPropagateInherit");
        }
        if self.inherit_only() {
            parts.push("InheritOnly");
        }
        join_or_none(parts)
    }
}

fn join_or_none(parts: Vec<&str>) -> String {
    if parts.is_empty() {
        "None".to_string()
    } else {
        parts.join(", ")
    }
}

/// Where an ACE takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliesTo {
    pub this_folder: bool,
    pub subfolders: bool,
    pub files: bool,
}

impl AppliesTo {
    /// "This folder, subfolders and files" style description.
    pub fn label(&self) -> String {
        let parts: Vec<&str> = [
            (self.this_folder, "this folder"),
            (self.subfolders, "subfolders"),
            (self.files, "files"),
        ]
        .iter()
        .filter(|(applies, _)| *applies)
        .map(|(_, name)| *name)
        .collect();

        match parts.as_slice() {
            [] => "nothing".to_string(),
            [only] => only.to_string(),
            [init @ .., last] => format!("{} and {}", init.join(", "), last),
        }
    }
}

/// Derive the effective scope of an ACE from its inheritance and propagation
/// flags. `InheritOnly` removes the folder itself; `NoPropagateInherit`
/// removes both child kinds whatever the container/object bits say.
pub fn resolve_scope(inheritance: InheritanceFlags, propagation: PropagationFlags) -> AppliesTo {
    let propagates = !propagation.no_propagate();
    AppliesTo {
        this_folder: !propagation.inherit_only(),
        subfolders: propagates && inheritance.container_inherit(),
        files: propagates && inheritance.object_inherit(),
    }
}
