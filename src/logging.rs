//! # Logging Setup
//!
//! Log events go to stderr so the report on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the level derived from `-q`/`-v`.

use crate::cli::Args;
use anyhow::{Context, Result};
use colored::*;
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use tracing::{Event, Level, Subscriber};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// A custom tracing event formatter for colorizing log output based on level.
///
/// The whole line is colored according to its severity, without timestamps
/// or level prefixes.
pub struct ColorizedFormatter;

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        // format_fields writes directly, so buffer to color the entire line.
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let colored_output = match *event.metadata().level() {
            Level::INFO => buffer.white(),
            Level::WARN => buffer.yellow(),
            Level::ERROR => buffer.red(),
            Level::DEBUG => buffer.blue(),
            Level::TRACE => buffer.purple(),
        };

        writeln!(writer, "{}", colored_output)
    }
}

/// Install the global subscriber for the CLI.
///
/// The returned guard flushes the `--log-file` writer when dropped and must
/// be held until the program exits.
pub fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string()));

    let console_layer = tracing_subscriber::fmt::layer()
        .event_format(ColorizedFormatter)
        .with_writer(io::stderr);

    let (file_layer, guard) = match args.log_file {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_colorized_formatter_writes_one_line_per_event() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(ColorizedFormatter)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Running mod.Bench iter 1");
            tracing::warn!("Failure while running benchmark");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("Running mod.Bench iter 1"));
        assert!(!output.contains("INFO"));
    }
}
