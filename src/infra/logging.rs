// ============================================================
// Layer 6 — Logging Setup
// ============================================================
// One global tracing subscriber per process. In console mode
// events go to stdout; otherwise they go to iter-prints.log in
// the run directory (no ANSI colours). RUST_LOG overrides the
// default `tomogan=info` filter.

use anyhow::{anyhow, Context, Result};
use std::{fs::File, path::Path, sync::Mutex};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "iter-prints.log";

const DEFAULT_DIRECTIVE: &str = "tomogan=info";

pub enum LogSink<'a> {
    Console,
    RunDirectory(&'a Path),
}

fn env_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(DEFAULT_DIRECTIVE.parse()?))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(sink: LogSink<'_>) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter()?);

    match sink {
        LogSink::Console => builder
            .try_init()
            .map_err(|e| anyhow!("Cannot install logger: {e}")),
        LogSink::RunDirectory(dir) => {
            let path = dir.join(LOG_FILE);
            let file = File::create(&path)
                .with_context(|| format!("Cannot create log file '{}'", path.display()))?;
            builder
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow!("Cannot install logger: {e}"))
        }
    }
}
