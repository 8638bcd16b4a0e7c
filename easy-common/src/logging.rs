//! Tracing subscriber setup from the `logging` component
//!
//! `logging.loggers.default.level` selects the level and
//! `logging.loggers.default.file_path` the destination (`@stderr`,
//! `@stdout` or a file appended to). `RUST_LOG` overrides the level.

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::StaticConfig;
use crate::{Error, Result};

/// Map a configured level name onto an `EnvFilter` directive
pub fn filter_directive(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        "none" | "off" => Ok("off"),
        other => Err(Error::Config(format!("unknown log level '{}'", other))),
    }
}

fn make_writer(file_path: &str) -> Result<BoxMakeWriter> {
    match file_path {
        "@stderr" => Ok(BoxMakeWriter::new(std::io::stderr)),
        "@stdout" => Ok(BoxMakeWriter::new(std::io::stdout)),
        path => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(BoxMakeWriter::new(Mutex::new(file)))
        }
    }
}

/// Install the global subscriber; a second call is a no-op
pub fn init(config: &StaticConfig) -> Result<()> {
    let default_logger = config.component("logging").child("loggers").child("default");
    let level = filter_directive(&config.log_level()?)?;
    let file_path = default_logger.get_str_or("file_path", "@stderr")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(file_path == "@stderr" || file_path == "@stdout")
                .with_writer(make_writer(&file_path)?),
        )
        .try_init();
    Ok(())
}
