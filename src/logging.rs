//! Structured logging bootstrap.
//!
//! Same line format as the rest of the toolkit:
//! `[timestamp][LEVEL][target][pid=..][tid=..] message`.  Stdout always; a
//! log file under the agent directory when the config enables one.

use std::path::Path;
use std::{process, thread};

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;

use crate::config::LoggingConfig;

fn level_filter(level: &str) -> LevelFilter {
    match level.to_uppercase().as_str() {
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Configure global logging from the `[logging]` block.
pub fn init(base_dir: &Path, cfg: &LoggingConfig) -> Result<(), fern::InitError> {
    let log_path = cfg
        .enable
        .then(|| base_dir.join(cfg.file.as_deref().unwrap_or("drvloader.log")));

    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}][tid={:?}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                thread::current().id(),
                msg
            ))
        })
        .level(level_filter(&cfg.level))
        .chain(std::io::stdout());

    if let Some(path) = log_path {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
