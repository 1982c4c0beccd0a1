mod commands;
mod logging;
mod progress;
mod report;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use acl_lens_core::diff::BaselineSnapshot;
use acl_lens_core::groups::GroupMembershipCache;
use acl_lens_core::identity::IdentityCache;
use acl_lens_core::{AclSnapshot, AppConfig, AuditEngine, PlatformSources, ScanOptions};
use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, ScanArgs, SourceArgs};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let _guard = logging::init_logger(args.verbose);

    let config = match acl_lens_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let outcome = match args.command {
        Some(Commands::Scan(scan)) => run_scan(&config, scan),
        Some(Commands::ExpandGroup { group_id, source }) => {
            run_expand_group(&config, &group_id, &source)
        }
        Some(Commands::IsPrivileged { user_id, source }) => {
            run_is_privileged(&config, &user_id, &source)
        }
        Some(Commands::BaselineDiff { before, after }) => run_baseline_diff(&before, &after),
        Some(Commands::CacheStats) => run_cache_stats(&config),
        Some(Commands::ClearCache { yes }) => run_clear_cache(&config, yes),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn identity_cache_path(config: &AppConfig) -> &Path {
    Path::new(&config.cache.identity_cache_path)
}

fn platform_sources(source: &SourceArgs) -> Result<PlatformSources> {
    match &source.snapshot {
        Some(path) => {
            let snapshot = AclSnapshot::load(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            Ok(PlatformSources::from_snapshot(Arc::new(snapshot)))
        }
        None => Ok(PlatformSources::local()),
    }
}

fn build_engine(config: &AppConfig, mut options: ScanOptions, source: &SourceArgs) -> Result<AuditEngine> {
    if let Some(backend) = source.backend {
        options.resolver_backend = backend.into();
    }
    let identity_cache = IdentityCache::load(identity_cache_path(config))
        .with_context(|| format!("loading identity cache {}", config.cache.identity_cache_path))?;
    let group_cache =
        GroupMembershipCache::new(Duration::from_secs(config.cache.group_cache_ttl_secs));

    let engine = AuditEngine::with_caches(
        options,
        platform_sources(source)?,
        Arc::new(identity_cache),
        Arc::new(group_cache),
    )
    .with_revalidation(config.cache.revalidate_cached_users);

    if !engine.directory_available() {
        warn!("No directory source available; names come from local translation only");
    }
    Ok(engine)
}

/// Cache write failures are logged; the command's own output stands.
fn persist_identity_cache(engine: &AuditEngine, config: &AppConfig) {
    if let Err(err) = engine.identity_cache().save(identity_cache_path(config)) {
        error!(
            "Failed to save identity cache to {}: {}",
            config.cache.identity_cache_path, err
        );
    }
}

fn run_scan(config: &AppConfig, args: ScanArgs) -> Result<()> {
    let mut options = config.scan.clone();
    if let Some(root) = args.root {
        options.root_path = root;
    }
    if args.max_depth.is_some() {
        options.max_depth = args.max_depth;
    }
    if args.no_inherited {
        options.include_inherited = false;
    }
    if args.no_resolve {
        options.resolve_identities = false;
    }
    if args.expand_groups {
        options.expand_groups = true;
    }
    if args.exclude_service_accounts {
        options.exclude_service_accounts = true;
    }
    if args.exclude_admin_accounts {
        options.exclude_admin_accounts = true;
    }
    options.ignore_patterns.extend(args.ignore_patterns);

    if options.root_path.is_empty() {
        bail!("No folder to scan: pass a root or set scan.root_path");
    }

    let engine = build_engine(config, options, &args.source)?;
    let reporter = CliReporter::new();
    let scanned = engine.scan(&reporter);
    persist_identity_cache(&engine, config);
    let mut result = scanned?;

    if let Some(path) = &args.baseline {
        let baseline = BaselineSnapshot::load(path)
            .with_context(|| format!("reading baseline {}", path.display()))?;
        engine.apply_baseline(&mut result, &baseline);
    }

    println!();
    report::print_scan(
        &engine,
        &result,
        &report::ReportOptions {
            use_effective: args.effective,
            show_all: args.all,
            show_entries: args.entries,
        },
    );

    if let Some(path) = &args.save_baseline {
        if result.was_cancelled() {
            warn!("Scan was cancelled; not saving a partial baseline");
        } else {
            BaselineSnapshot::from_scan(&result)
                .save(path)
                .with_context(|| format!("writing baseline {}", path.display()))?;
            info!("Baseline saved to {}", path.display());
        }
    }

    Ok(())
}

fn run_expand_group(config: &AppConfig, group_id: &str, source: &SourceArgs) -> Result<()> {
    let engine = build_engine(config, config.scan.clone(), source)?;
    let group = engine.resolve(group_id);
    if !group.is_group {
        warn!("{} does not resolve to a group", group_id);
    }
    let members = engine.expand_group(group_id);
    persist_identity_cache(&engine, config);

    report::print_members(group_id, &group.display_name, &members?);
    Ok(())
}

fn run_is_privileged(config: &AppConfig, user_id: &str, source: &SourceArgs) -> Result<()> {
    let engine = build_engine(config, config.scan.clone(), source)?;
    let user = engine.resolve(user_id);
    let privileged = engine.is_privileged_user(user_id);
    persist_identity_cache(&engine, config);

    let verdict = if privileged {
        "privileged".red().bold()
    } else {
        "not privileged".green()
    };
    println!("{} ({}) is {}", user.display_name, user_id, verdict);
    Ok(())
}

fn run_baseline_diff(before: &Path, after: &Path) -> Result<()> {
    let earlier = BaselineSnapshot::load(before)
        .with_context(|| format!("reading baseline {}", before.display()))?;
    let later = BaselineSnapshot::load(after)
        .with_context(|| format!("reading baseline {}", after.display()))?;

    info!(
        "Comparing baseline {} against {}",
        earlier.captured_at, later.captured_at
    );
    report::print_baseline_changes(&later.changes_since(&earlier));
    Ok(())
}

fn run_cache_stats(config: &AppConfig) -> Result<()> {
    let cache = IdentityCache::load(identity_cache_path(config))?;
    println!(
        "{} cached identities in {}",
        format!("{}", cache.len()).cyan(),
        config.cache.identity_cache_path
    );
    println!(
        "Group memberships are cached in memory for {}s",
        config.cache.group_cache_ttl_secs
    );
    Ok(())
}

fn run_clear_cache(config: &AppConfig, skip_prompt: bool) -> Result<()> {
    let cache = IdentityCache::load(identity_cache_path(config))?;
    let count = cache.len();
    if count == 0 {
        println!("Identity cache is already empty");
        return Ok(());
    }

    let prompt = format!(
        "Delete {} cached identities from {}?",
        count, config.cache.identity_cache_path
    );
    let confirmed = skip_prompt
        || confirm(&prompt, false, &mut io::stdin().lock(), &mut io::stdout())?;
    if !confirmed {
        info!("Identity cache left untouched");
        return Ok(());
    }

    cache.clear();
    cache.save(identity_cache_path(config))?;
    println!("Removed {} cached identities", count);
    Ok(())
}

/// Ask a yes/no question until the answer parses; an empty answer or end of
/// input takes `default`.
fn confirm<R: BufRead, W: Write>(
    prompt: &str,
    default: bool,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    let mut line = String::new();
    loop {
        write!(output, "{} ({}): ", prompt, hint)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(default);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}
