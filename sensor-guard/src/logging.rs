//! Logging configuration for sensor-guard.
//!
//! The pipeline handles a very large number of events, so per-event logging is
//! off by default and gated behind [`LogConfig`]. Process-wide subscriber setup
//! lives in [`setup`].

/// Verbosity knobs consulted on hot paths.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to log every streamed event and every anomaly
    pub log_each_event: bool,
    /// Whether to log per-file ingestion progress
    pub log_file_operations: bool,
    /// Whether to log the full text returned by the decision handler
    pub log_decisions: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_each_event: false,
            log_file_operations: true,
            log_decisions: true,
            max_field_length: 512,
        }
    }
}

impl LogConfig {
    /// Logs everything, including each event.
    pub fn verbose() -> Self {
        Self {
            log_each_event: true,
            log_file_operations: true,
            log_decisions: true,
            max_field_length: 4096,
        }
    }

    /// Minimal logging for long unattended runs.
    pub fn production() -> Self {
        Self {
            log_each_event: false,
            log_file_operations: false,
            log_decisions: false,
            max_field_length: 256,
        }
    }
}

/// Debug-level log of a single event, emitted only when `log_each_event` is set.
#[macro_export]
macro_rules! log_event {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_each_event {
            tracing::debug!($($arg)*);
        }
    };
}

/// Info-level log of a file operation, emitted only when `log_file_operations` is set.
#[macro_export]
macro_rules! log_file_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_file_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` characters.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        None => value.to_string(),
        Some((cut, _)) => format!("{}...(truncated)", &value[..cut]),
    }
}

/// Process-wide `tracing` subscriber setup.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for dependencies
        pub level: Level,
        /// Log level for the `sensor_guard` crate
        pub crate_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, pipeline at INFO.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::INFO,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter directive string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},sensor_guard={}",
                    self.level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs the global subscriber. `RUST_LOG` takes precedence over the
    /// configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sensor_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.env_filter()))?;

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
