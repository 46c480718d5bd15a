use std::str::FromStr;

use log::LevelFilter;

/// Picks the level from `--log-level`, then `verbose`, then `RUST_LOG`,
/// falling back to info.
pub fn level_from(
    verbose: bool,
    log_level: Option<LevelFilter>,
    rust_log: Option<&str>,
) -> LevelFilter {
    if let Some(level) = log_level {
        return level;
    }
    if verbose {
        return LevelFilter::Debug;
    }
    rust_log
        .and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Logs to stderr so records on stdout stay machine readable.
pub fn setup_logging(
    verbose: bool,
    log_level: Option<LevelFilter>,
) -> Result<(), fern::InitError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let level = level_from(verbose, log_level, rust_log.as_deref());

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}
