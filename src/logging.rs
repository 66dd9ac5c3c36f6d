//! Process-wide logger for the CLI.
use std::sync::Once;

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// `env_logger` filter syntax, e.g. `"debug"` or `"dictgen::parser=trace"`.
    /// Falls back to `RUST_LOG`, then to `info`.
    pub filter: Option<String>,
    pub quiet: bool,
}

static INIT: Once = Once::new();

/// Install the global logger. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match (config.quiet, config.filter, std::env::var("RUST_LOG")) {
            (true, _, _) => {
                builder.filter_level(log::LevelFilter::Warn);
            }
            (false, Some(filter), _) | (false, None, Ok(filter)) => {
                builder.parse_filters(&filter);
            }
            (false, None, Err(_)) => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }
        builder.format_timestamp(None);
        builder.init();
        log::debug!("logging initialized");
    });
}
