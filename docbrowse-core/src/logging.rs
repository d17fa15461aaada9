use std::{
    path::Path,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{Context, Result};
use tracing::Metadata;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{
        self, FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{LogRotation, LoggingConfig};

pub struct Logger;

impl Logger {
    /// Call **once** near the start of `main`; keep the guard alive until exit.
    pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
        validate_log_directory(&config.log_dir)?;
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!(
                "Failed to create log directory: {}",
                config.log_dir.display()
            )
        })?;

        let rotation = match config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        };

        // logs/docbrowse.YYYY-MM-DD.log
        let file_appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(config.file_prefix.as_str())
            .filename_suffix("log")
            .build(&config.log_dir)
            .context("Failed to create file appender")?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .event_format(SeqFileMod)
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(make_filter(config.level.as_str())?);

        // optional stderr layer for live debugging
        let stderr_filter = make_filter(config.level.as_str())?;
        let stderr_layer = config.stderr.then(|| {
            fmt::layer()
                .event_format(SeqFileMod)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_filter(stderr_filter)
        });

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .try_init()
            .context("Failed to install global tracing subscriber")?;

        Ok(guard)
    }
}

fn make_filter(level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive(Directive::from_str(level).context("Invalid log level in config")?))
}

fn validate_log_directory(path: &Path) -> Result<()> {
    if path.components().count() == 0 {
        anyhow::bail!("Invalid log directory: empty path");
    }

    if path
        .components()
        .any(|component| component == std::path::Component::ParentDir)
    {
        anyhow::bail!("Invalid log directory: path contains parent directory references");
    }

    Ok(())
}

static SEQ: AtomicUsize = AtomicUsize::new(1);

/// Custom formatter: `[SEQ] LEVEL [file:line mod::path] message`
struct SeqFileMod;

impl<S, N> FormatEvent<S, N> for SeqFileMod
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut w: Writer<'_>,
        ev: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        // monotonically-increasing sequence number, shared by all layers
        let seq: usize = SEQ.fetch_add(1, Ordering::Relaxed);

        let meta: &'static Metadata<'static> = ev.metadata();
        write!(
            w,
            "{seq:06} {:5} [{}:{} {}] ",
            meta.level(),
            meta.file().unwrap_or("??"),
            meta.line().unwrap_or(0),
            meta.module_path().unwrap_or("???"),
        )?;

        ctx.field_format().format_fields(w.by_ref(), ev)?;
        writeln!(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rejects_parent_references() {
        assert!(validate_log_directory(&PathBuf::from("../logs")).is_err());
        assert!(validate_log_directory(&PathBuf::from("")).is_err());
        assert!(validate_log_directory(&PathBuf::from("./logs")).is_ok());
    }

    #[test]
    fn bad_level_is_reported() {
        assert!(make_filter("info").is_ok());
        assert!(make_filter("docbrowse_core=debug").is_ok());
        assert!(make_filter("docbrowse_core=loud").is_err());
    }
}
