use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level or `EnvFilter` directives for every crate.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path.
    ///
    /// If the file cannot be opened, file logging is disabled while other sinks remain active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    /// Configured directives, extended by `RUST_LOG` when it is set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let config_directives = Self::normalize_level_directives(&self.level);
        let fallback = || {
            tracing_subscriber::EnvFilter::try_new(&config_directives)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(Self::default_level()))
        };

        match std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
        {
            Some(env_directives) => {
                let directives = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| fallback())
            }
            None => fallback(),
        }
    }
}

/// Install the global tracing subscriber. Only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    static TRACING_INIT: Once = Once::new();

    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let mut open_failed = None;
        let file = config.file.as_ref().and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| open_failed = Some((path.clone(), err)))
                .ok()
                .map(Arc::new)
        });

        let writer = match (config.stderr, file) {
            (true, Some(file)) => BoxMakeWriter::new(std::io::stderr.and(file)),
            (true, None) => BoxMakeWriter::new(std::io::stderr),
            (false, Some(file)) => BoxMakeWriter::new(file),
            (false, None) => BoxMakeWriter::new(std::io::sink),
        };

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            if let Some((path, err)) = open_failed {
                tracing::warn!(
                    target: "mapi.config",
                    path = %path.display(),
                    error = %err,
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
}
