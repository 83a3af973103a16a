use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps repeated `-v` flags to the default log level. `RUST_LOG` still wins.
pub(crate) fn default_log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub(crate) fn init_tracing(verbose: u8) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_log_level(verbose).into())
        .from_env_lossy();

    // stdout carries command output (urls, json), so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
