use std::env;
use std::path::Path;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/acl-lens.log";

/// Directive for both crates of the tool; `ACL_LENS_LOG` overrides it.
fn filter_directive(verbose: bool) -> String {
    if let Ok(directive) = env::var("ACL_LENS_LOG") {
        return directive;
    }
    let level = if verbose { "debug" } else { "info" };
    format!("warn,acl_lens={level},acl_lens_core={level}")
}

/// Console output goes to stderr so the report on stdout stays clean; the
/// file log rolls daily next to `ACL_LENS_LOG_FILE`.
pub fn init_logger(verbose: bool) -> WorkerGuard {
    let log_file = env::var("ACL_LENS_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let log_path = Path::new(&log_file);
    let directory = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "acl-lens.log".to_string());

    let file_appender = tracing_appender::rolling::daily(directory, prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(EnvFilter::new(filter_directive(verbose)))
        .init();

    debug!("Writing log file under {}", directory.display());

    guard
}
