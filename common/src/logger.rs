use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use util::config::AppConfig;
use util::paths::{ensure_dir, logs_dir};

/// Install the global tracing subscriber.
///
/// Logs always go to a daily-rolling file under `{STORAGE_ROOT}/logs`. A
/// console layer on stderr is added when `LOG_TO_STDOUT` is set, so reports
/// printed on stdout stay clean. The filter comes from `LOG_LEVEL` (any
/// `EnvFilter` directive), defaulting to the configured level.
///
/// Keep the returned guard alive for the life of the process, otherwise
/// buffered file output is lost.
pub fn init_logging() -> WorkerGuard {
    let (log_file, log_level, log_to_stdout) = {
        let cfg = AppConfig::global();
        (cfg.log_file.clone(), cfg.log_level.clone(), cfg.log_to_stdout)
    };

    let dir = ensure_dir(logs_dir()).unwrap_or_else(|_| std::env::temp_dir());
    let file_appender = rolling::daily(dir, log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = log_to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });

    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(log_level));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init();

    guard
}
