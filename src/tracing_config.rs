//! Tracing subscriber setup for the command line tool
//!
//! The library only emits events; installing a subscriber is left to
//! applications. This module is what the `canvas-cutout` binary uses.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors
    Console,
    /// Compact output without colors, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    Console,
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
}

/// Keeps background log writers alive; drop it at exit to flush
#[derive(Debug, Default)]
#[must_use]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _worker: Option<tracing_appender::non_blocking::WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Tracing configuration builder
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Overrides `verbosity` when set
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive for the verbosity level
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn fmt_layer<W>(format: TracingFormat, ansi: bool, writer: W) -> BoxedLayer
    where
        W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false);
        match format {
            TracingFormat::Console => layer.with_ansi(ansi).compact().boxed(),
            TracingFormat::Compact => layer.with_ansi(false).compact().boxed(),
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => layer
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        let filter = match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();
        let layer = match &self.output {
            TracingOutput::Console => Self::fmt_layer(self.format, true, std::io::stderr),
            #[cfg(feature = "tracing-files")]
            TracingOutput::File(path) => {
                let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
                let file_name = path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("canvas-cutout.log"));
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, worker) = tracing_appender::non_blocking(appender);
                guard._worker = Some(worker);
                Self::fmt_layer(self.format, false, writer)
            },
        };

        Registry::default().with(layer).with(filter).try_init()?;
        Ok(guard)
    }
}

/// Install console tracing for the given `-v` count
///
/// # Errors
/// - A global subscriber is already installed
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<TracingGuard> {
    TracingConfig::new().with_verbosity(verbosity).init()
}
