use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{debug, LevelFilter};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing_subscriber::filter::EnvFilter as TracingEnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

struct SimpleTimeFormatter;

impl FormatTime for SimpleTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let format = format_description!("[hour]:[minute]:[second]");
        let formatted = OffsetDateTime::now_utc()
            .format(format)
            .unwrap_or_else(|_| String::from("??:??:??"));
        write!(w, "{formatted}")
    }
}

/// `<UTC timestamp>.log`, sortable and free of characters some filesystems
/// reject.
pub(crate) fn log_file_name(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]Z");
    let stamp = at
        .format(format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("{stamp}.log")
}

/// Installs the console subscriber and, when `log_dir` is given, a plain-text
/// file layer next to it. Returns the log file path, if any.
///
/// `log` records from every crate reach the subscriber through its `log`
/// bridge.
pub fn setup_logging(log_level: &str, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let level: LevelFilter = log_level
        .parse()
        .with_context(|| format!("invalid log level {log_level:?}"))?;

    let env_filter = TracingEnvFilter::from_default_env()
        .add_directive(format!("{level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?)
        .add_directive("alloy=warn".parse()?)
        .add_directive("mockito=warn".parse()?);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(SimpleTimeFormatter)
        .compact();

    let (file_layer, log_file) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(OffsetDateTime::now_utc()));
            let file = File::create(&path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(path) = &log_file {
        debug!("Logging to console and {}", path.display());
    }
    Ok(log_file)
}
