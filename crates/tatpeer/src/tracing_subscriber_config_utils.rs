use std::io::LineWriter;

use anyhow::Context;

pub struct InitLoggingOptions<'a> {
    pub default_rust_log_value: Option<&'a str>,
    /// Emit JSON lines on stderr instead of the human readable format.
    pub json: bool,
    pub log_file: Option<&'a str>,
    pub log_file_rust_log: Option<&'a str>,
}

impl Default for InitLoggingOptions<'_> {
    fn default() -> Self {
        Self {
            default_rust_log_value: None,
            json: false,
            log_file: None,
            log_file_rust_log: None,
        }
    }
}

/// Install a global subscriber for the harness process.
///
/// Stderr is filtered by RUST_LOG, falling back to `default_rust_log_value` (or "info").
/// If `log_file` is set, everything matching `log_file_rust_log` is appended there too.
#[inline(never)]
pub fn init_logging(opts: InitLoggingOptions) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let stderr_filter = EnvFilter::builder()
        .with_default_directive(
            opts.default_rust_log_value
                .unwrap_or("info")
                .parse()
                .context("can't parse provided rust_log value")?,
        )
        .from_env()
        .context("invalid RUST_LOG value")?;

    let stderr_layer = if opts.json {
        fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_filter(stderr_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(stderr_filter)
            .boxed()
    };

    let file_layer = match opts.log_file {
        Some(log_file) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .with_context(|| format!("error opening log file {:?}", log_file))?;
            let filter = EnvFilter::builder()
                .parse(opts.log_file_rust_log.unwrap_or("info,tatpeer=debug"))
                .context("can't parse log-file-rust-log")?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(LineWriter::new(file)))
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("can't init logging")?;
    Ok(())
}
