// Logging for readypool
//
// Built on the `tracing` ecosystem. The library itself only emits events;
// installing a subscriber is left to the application, which can use one of
// the `init_*` helpers below.
//
// # Usage Examples
//
// ```rust
// use readypool::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Wrapper loops run on their own threads. They inherit the subscriber that
// was current when the pool was opened, so a scoped subscriber installed
// with `tracing::subscriber::with_default` also sees worker events.
//
// ## Using Log Macros
//
// ```rust
// let span = readypool::worker_span!(3);
// let _guard = span.enter();
//
// readypool::log_pool!(pool.id(), "opened", workers = 4);
// ```

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the readypool logging setup
///
/// # Examples
///
/// ```rust
/// use readypool::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("readypool=debug,readypool::scheduler=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Only the first init call installs a subscriber
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

/// Install the global subscriber described by `config`.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
            (false, true) => Box::new(registry.with(
                fmt::layer()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
            (false, false) => Box::new(registry.with(
                fmt::layer()
                    .without_time()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Open `path` for appending, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Install a subscriber writing to the console and to `log_file`.
///
/// The file is opened up front so a bad path is reported here rather than
/// swallowed by the writer. File output never carries ANSI colors.
///
/// # Errors
/// Returns the I/O error if the log file cannot be opened or created.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    file_writer(log_file)?;

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

pub fn init_default_with_file(path: &str) -> io::Result<()> {
    init_with_file(LogConfig::default(), path)
}

fn development_config() -> LogConfig {
    LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("readypool=debug,readypool::scheduler=trace".to_string()),
    }
}

/// Detailed logs for development.
///
/// - DEBUG level for the crate
/// - TRACE level for the scheduler (every handshake and dispatch)
/// - Colorized output with file/line and thread names
pub fn init_development() {
    init(development_config());
}

pub fn init_development_with_file(path: &str) -> io::Result<()> {
    init_with_file(development_config(), path)
}

fn production_config() -> LogConfig {
    LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    }
}

/// JSON output at INFO level, without file/line information.
pub fn init_production() {
    init(production_config());
}

pub fn init_production_with_file(path: &str) -> io::Result<()> {
    init_with_file(production_config(), path)
}

fn test_config() -> LogConfig {
    LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    }
}

/// Warnings and errors only, to keep test output readable.
///
/// ```ignore
/// #[test]
/// fn my_test() {
///     readypool::logging::init_test();
///     // ...
/// }
/// ```
pub fn init_test() {
    init(test_config());
}

pub fn init_test_with_file(path: &str) -> io::Result<()> {
    init_with_file(test_config(), path)
}

/// Span covering everything a pool does
///
/// # Examples
///
/// ```ignore
/// let span = readypool::pool_span!(pool.id());
/// let _guard = span.enter();
///
/// let span = readypool::pool_span!(pool.id(), workers = 8);
/// ```
#[macro_export]
macro_rules! pool_span {
    ($pool:expr) => {
        tracing::info_span!("pool", id = %$pool)
    };
    ($pool:expr, $($fields:tt)*) => {
        tracing::info_span!("pool", id = %$pool, $($fields)*)
    };
}

/// Span entered by a wrapper loop for its whole lifetime
#[macro_export]
macro_rules! worker_span {
    ($worker:expr) => {
        tracing::debug_span!("worker", id = $worker)
    };
    ($worker:expr, $($fields:tt)*) => {
        tracing::debug_span!("worker", id = $worker, $($fields)*)
    };
}

/// Log pool lifecycle events (opened, closing, closed)
///
/// # Examples
///
/// ```ignore
/// readypool::log_pool!(pool.id(), "opened");
/// readypool::log_pool!(pool.id(), "closing", pending_async_jobs = 2);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($pool:expr, $event:expr) => {
        tracing::info!(pool = %$pool, event = $event);
    };
    ($pool:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(pool = %$pool, event = $event, $($fields)*);
    };
}

/// Log per-job dispatch events at trace level
#[macro_export]
macro_rules! log_dispatch {
    ($worker:expr, $event:expr) => {
        tracing::trace!(worker = $worker, event = $event);
    };
    ($worker:expr, $event:expr, $($fields:tt)*) => {
        tracing::trace!(worker = $worker, event = $event, $($fields)*);
    };
}

/// Log error events
///
/// ```rust
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "socket gone");
/// readypool::log_error!(error, worker = 2);
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*);
    };
}

/// The dispatcher current on this thread.
///
/// Wrapper threads run under the dispatcher captured when their pool opened.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

pub use tracing::{debug, error, info, trace, warn};
