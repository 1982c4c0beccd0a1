use acl_lens_core::diff::{BaselineDiffSummary, DiffStatus};
use acl_lens_core::identity::DirectoryMember;
use acl_lens_core::model::AccessDecision;
use acl_lens_core::{AceEntry, AuditEngine, FolderDetail, ScanResult};
use colored::*;
use std::collections::BTreeMap;

fn status_label(status: DiffStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        DiffStatus::Same => label.green(),
        DiffStatus::MorePermissive => label.red().bold(),
        DiffStatus::MoreRestrictive => label.yellow(),
        DiffStatus::DenyPresent => label.magenta(),
        DiffStatus::BrokenInheritance => label.cyan(),
        DiffStatus::Unknown => label.dimmed(),
    }
}

fn baseline_badge(summary: &BaselineDiffSummary) -> Option<String> {
    if summary.new_folder {
        Some("new since baseline".to_string())
    } else if summary.is_unchanged() {
        None
    } else {
        Some(format!(
            "+{} -{} since baseline",
            summary.added_count(),
            summary.removed_count()
        ))
    }
}

/// What `print_scan` shows.
pub struct ReportOptions {
    pub use_effective: bool,
    pub show_all: bool,
    pub show_entries: bool,
}

fn print_entry(indent: &str, entry: &AceEntry) {
    let decision = match entry.decision {
        AccessDecision::Allow => "allow".green(),
        AccessDecision::Deny => "deny".red(),
    };
    let mut line = format!(
        "{}    {} {} {} [{}]",
        indent,
        decision,
        entry.principal_name,
        entry.rights,
        entry.applies_to().label()
    );
    if entry.inherited {
        line.push_str(&format!(" {}", "inherited".dimmed()));
    }
    if !entry.provenance.is_direct() {
        line.push_str(&format!(" {}", entry.provenance.to_string().dimmed()));
    }
    if entry.disabled {
        line.push_str(&format!(" {}", "disabled".yellow()));
    }
    println!("{}", line);
}

fn print_folder(folder: &FolderDetail, status: DiffStatus, reasons: &[String], show_entries: bool) {
    let indent = "  ".repeat(folder.depth);
    let mut line = format!("{}{} [{}]", indent, folder.path, status_label(status));
    if let Some(badge) = folder.baseline_diff.as_ref().and_then(baseline_badge) {
        line.push_str(&format!(" ({})", badge.blue()));
    }
    println!("{}", line);
    for reason in reasons {
        println!("{}    - {}", indent, reason);
    }
    if show_entries {
        for entry in &folder.entries {
            print_entry(&indent, entry);
        }
    }
}

/// Print every folder that differs from its parent (all folders with
/// `show_all`), then the per-folder failures and a summary line.
pub fn print_scan(engine: &AuditEngine, result: &ScanResult, options: &ReportOptions) {
    let mut flagged = 0;
    for folder in &result.folders {
        let Some(explanation) = engine.explain(result, &folder.path, options.use_effective) else {
            continue;
        };
        let baseline_changed = folder
            .baseline_diff
            .as_ref()
            .map(|b| b.new_folder || !b.is_unchanged())
            .unwrap_or(false);
        if explanation.status != DiffStatus::Same {
            flagged += 1;
        } else if !options.show_all && !baseline_changed {
            continue;
        }
        print_folder(
            folder,
            explanation.status,
            &explanation.reasons,
            options.show_entries,
        );
    }

    if !result.errors.is_empty() {
        println!();
        println!("{}", format!("{} folders could not be read:", result.errors.len()).red());
        for err in &result.errors {
            println!("  {}", err);
        }
    }

    println!();
    println!(
        "{} folders, {} entries, {} differ from their parent{}",
        format!("{}", result.folders.len()).cyan(),
        format!("{}", result.total_entries()).cyan(),
        format!("{}", flagged).yellow(),
        if result.was_cancelled() {
            " (scan cancelled, results are partial)".red().to_string()
        } else {
            String::new()
        }
    );
}

pub fn print_members(group_id: &str, group_name: &str, members: &[DirectoryMember]) {
    println!(
        "{} ({}) has {} members",
        group_name.bold(),
        group_id,
        format!("{}", members.len()).cyan()
    );
    for member in members {
        let id = member.id.as_deref().unwrap_or("-");
        if member.is_disabled {
            println!("  {} {}", member.display().dimmed(), id.dimmed());
        } else {
            println!("  {} {}", member.display(), id.dimmed());
        }
    }
}

pub fn print_baseline_changes(changes: &BTreeMap<String, BaselineDiffSummary>) {
    if changes.is_empty() {
        println!("{}", "No changes between baselines".green());
        return;
    }
    for (path, summary) in changes {
        let badge = if summary.new_folder {
            "new".blue()
        } else if summary.added.is_empty() {
            "removed".yellow()
        } else {
            "changed".yellow()
        };
        println!("{} [{}]", path, badge);
        for key in &summary.added {
            println!("    {} {}", "+".green(), key);
        }
        for key in &summary.removed {
            println!("    {} {}", "-".red(), key);
        }
    }
    println!();
    println!("{} folders changed", format!("{}", changes.len()).yellow());
}
