//! Name- and identifier-based principal classification.
//!
//! These are heuristics. They never consult the directory, so they still
//! work when every directory source is down, and they always give the same
//! answer for the same name/identifier pair.

pub const EVERYONE_SID: &str = "S-1-1-0";

/// Well-known group identifiers (exact match).
const WELL_KNOWN_GROUPS: &[&str] = &[
    "S-1-1-0",      // Everyone
    "S-1-3-0",      // CREATOR OWNER
    "S-1-3-1",      // CREATOR GROUP
    "S-1-5-2",      // NETWORK
    "S-1-5-4",      // INTERACTIVE
    "S-1-5-11",     // Authenticated Users
    "S-1-5-32-544", // Administrators
    "S-1-5-32-545", // Users
    "S-1-5-32-546", // Guests
    "S-1-5-32-547", // Power Users
    "S-1-5-32-548", // Account Operators
    "S-1-5-32-549", // Server Operators
    "S-1-5-32-551", // Backup Operators
];

/// Domain-relative RIDs of well-known domain groups.
const DOMAIN_GROUP_RIDS: &[&str] = &["-512", "-513", "-514", "-515", "-516", "-518", "-519"];

const SERVICE_SIDS: &[&str] = &["S-1-5-18", "S-1-5-19", "S-1-5-20"];
const SERVICE_SID_PREFIXES: &[&str] = &["S-1-5-80-", "S-1-5-82-", "S-1-5-83-"];
const SERVICE_NAME_PREFIXES: &[&str] = &["svc_", "svc-", "svc.", "sa_", "sa-", "gmsa_", "gmsa-"];
const SERVICE_NAME_MARKERS: &[&str] = &["service", "svc"];
const SERVICE_DOMAINS: &[&str] = &["nt service", "iis apppool", "nt virtual machine"];
const SERVICE_ACCOUNTS: &[&str] = &["system", "local service", "network service"];

const ADMIN_SIDS: &[&str] = &["S-1-5-32-544"];
/// Administrator (500), Domain Admins (512), Schema Admins (518), Enterprise Admins (519).
const ADMIN_RIDS: &[&str] = &["-500", "-512", "-518", "-519"];
const ADMIN_NAME_PREFIXES: &[&str] = &["adm_", "adm-", "admin_", "admin-", "a-"];
const ADMIN_NAME_MARKERS: &[&str] = &["admin"];

/// Groups whose members are treated as privileged.
pub const PRIVILEGED_GROUPS: &[&str] = &[
    "administrators",
    "domain admins",
    "enterprise admins",
    "schema admins",
    "account operators",
    "backup operators",
    "server operators",
    "print operators",
];

/// Lower-case an account name and strip any `DOMAIN\` prefix or `@domain` suffix.
pub fn normalize_account_name(name: &str) -> String {
    let name = name.trim();
    let name = name.rsplit('\\').next().unwrap_or(name);
    let name = name.split('@').next().unwrap_or(name);
    name.to_lowercase()
}

fn domain_part(name: &str) -> Option<String> {
    name.rsplit_once('\\').map(|(domain, _)| domain.trim().to_lowercase())
}

fn is_domain_sid(id: &str) -> bool {
    id.to_uppercase().starts_with("S-1-5-21-")
}

pub fn is_well_known_group(id: &str) -> bool {
    let id = id.to_uppercase();
    WELL_KNOWN_GROUPS.contains(&id.as_str())
        || (is_domain_sid(&id) && DOMAIN_GROUP_RIDS.iter().any(|rid| id.ends_with(rid)))
}

pub fn is_service_account(name: &str, id: &str) -> bool {
    let upper_id = id.to_uppercase();
    if SERVICE_SIDS.contains(&upper_id.as_str())
        || SERVICE_SID_PREFIXES.iter().any(|p| upper_id.starts_with(p))
    {
        return true;
    }

    if let Some(domain) = domain_part(name) {
        if SERVICE_DOMAINS.contains(&domain.as_str()) {
            return true;
        }
    }

    let account = normalize_account_name(name);
    if account.is_empty() {
        return false;
    }
    // Managed service accounts and machine accounts end in '$'.
    account.ends_with('$')
        || SERVICE_ACCOUNTS.contains(&account.as_str())
        || SERVICE_NAME_PREFIXES.iter().any(|p| account.starts_with(p))
        || SERVICE_NAME_MARKERS.iter().any(|m| account.contains(m))
}

pub fn is_admin_account(name: &str, id: &str) -> bool {
    let upper_id = id.to_uppercase();
    if ADMIN_SIDS.contains(&upper_id.as_str())
        || (is_domain_sid(&upper_id) && ADMIN_RIDS.iter().any(|rid| upper_id.ends_with(rid)))
    {
        return true;
    }

    let account = normalize_account_name(name);
    if account.is_empty() {
        return false;
    }
    PRIVILEGED_GROUPS.contains(&account.as_str())
        || ADMIN_NAME_PREFIXES.iter().any(|p| account.starts_with(p))
        || ADMIN_NAME_MARKERS.iter().any(|m| account.contains(m))
}

pub fn is_privileged_group_name(name: &str) -> bool {
    PRIVILEGED_GROUPS.contains(&normalize_account_name(name).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_account_name() {
        assert_eq!(normalize_account_name(r"CORP\Domain Admins"), "domain admins");
        assert_eq!(normalize_account_name("jdoe@corp.example"), "jdoe");
        assert_eq!(normalize_account_name(" BUILTIN\\Administrators "), "administrators");
    }

    #[test]
    fn test_service_accounts() {
        assert!(is_service_account(r"NT AUTHORITY\SYSTEM", "S-1-5-18"));
        assert!(is_service_account(r"NT SERVICE\TrustedInstaller", "S-1-5-80-956008885"));
        assert!(is_service_account(r"CORP\svc_backup", "S-1-5-21-1-2-3-1201"));
        assert!(is_service_account(r"CORP\FILESRV01$", "S-1-5-21-1-2-3-1202"));
        assert!(!is_service_account(r"CORP\jdoe", "S-1-5-21-1-2-3-1203"));
    }

    #[test]
    fn test_admin_accounts() {
        assert!(is_admin_account(r"BUILTIN\Administrators", "S-1-5-32-544"));
        assert!(is_admin_account("whoever", "S-1-5-21-1-2-3-500"));
        assert!(is_admin_account(r"CORP\adm_jdoe", "S-1-5-21-1-2-3-1300"));
        assert!(!is_admin_account(r"CORP\jdoe", "S-1-5-21-1-2-3-1301"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let first = is_service_account(r"CORP\svc_sql", "S-1-5-21-9");
        for _ in 0..10 {
            assert_eq!(is_service_account(r"CORP\svc_sql", "S-1-5-21-9"), first);
        }
    }

    #[test]
    fn test_well_known_groups() {
        assert!(is_well_known_group("S-1-1-0"));
        assert!(is_well_known_group("s-1-5-32-545"));
        assert!(is_well_known_group("S-1-5-21-1-2-3-513"));
        assert!(!is_well_known_group("S-1-5-21-1-2-3-1105"));
    }
}
