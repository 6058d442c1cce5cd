//! Logging configuration and subscriber setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding application. [`setup::init_logging`] is the one the
//! `term-runner` binary uses.

/// Default limit for user SQL and assertions written to log fields.
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 256;

/// Controls what the runner logs and how much of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether passed tests are logged as well as failed ones
    pub log_check_details: bool,
    /// Whether to log a summary line per completed run
    pub log_run_summary: bool,
    /// Maximum length for logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_check_details: false,
            log_run_summary: true,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
        }
    }
}

impl LogConfig {
    /// Logs every test, with long fields.
    pub fn verbose() -> Self {
        Self {
            log_check_details: true,
            log_run_summary: true,
            max_field_length: 1024,
        }
    }

    /// Failures only, short fields, no run summary.
    pub fn production() -> Self {
        Self {
            log_check_details: false,
            log_run_summary: false,
            max_field_length: 128,
        }
    }

    /// Truncates `value` to this configuration's field limit.
    pub fn truncate<'a>(&self, value: &'a str) -> std::borrow::Cow<'a, str> {
        if value.len() <= self.max_field_length {
            std::borrow::Cow::Borrowed(value)
        } else {
            std::borrow::Cow::Owned(truncate_field(value, self.max_field_length))
        }
    }
}

/// Truncates a string to at most `max_length` bytes, on a char boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global `tracing` subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything outside this crate
        pub level: Level,
        /// Log level for `term_runner` targets
        pub runner_level: Level,
        /// Whether to emit JSON lines instead of human-readable text
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                runner_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, warnings from dependencies, info from the runner.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                runner_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Text output at debug level.
        pub fn development() -> Self {
            Self {
                level: Level::INFO,
                runner_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the level for everything outside this crate.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the level for runner components.
        pub fn with_runner_level(mut self, level: Level) -> Self {
            self.runner_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},term_runner={}",
                    self.level.as_str().to_lowercase(),
                    self.runner_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs the global subscriber. `RUST_LOG` takes precedence over the
    /// configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_runner::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
