use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self},
    prelude::*,
};

/// Log target of the module that logs every protocol line at TRACE level.
pub const PROTOCOL_TARGET: &str = "cp2k_shell::engine::process";

pub fn build_filter(verbosity: u8, quiet: bool, trace_protocol: bool) -> Targets {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let filter = Targets::new().with_default(level_filter);
    if trace_protocol {
        filter.with_target(PROTOCOL_TARGET, LevelFilter::TRACE)
    } else {
        filter
    }
}

pub fn setup_logging(
    verbosity: u8,
    quiet: bool,
    log_file: Option<PathBuf>,
    trace_protocol: bool,
) -> Result<()> {
    let filter = build_filter(verbosity, quiet, trace_protocol);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer);

    let result = if let Some(path) = log_file {
        let file = File::create(&path).map_err(CliError::Io)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber.with(file_layer).try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use std::thread;
    use std::time::Duration;
    use tracing::{Level, debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None, false).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        error!("This is an error");
        warn!("This is a warning");
        info!("This is info");
        debug!("This is debug");
        trace!("This is trace");
    }

    #[test]
    fn filter_levels_follow_verbosity() {
        let filter = build_filter(0, false, false);
        assert!(filter.would_enable("cp2k_shell::engine::session", &Level::WARN));
        assert!(!filter.would_enable("cp2k_shell::engine::session", &Level::INFO));

        let filter = build_filter(2, false, false);
        assert!(filter.would_enable("cp2k_shell::engine::session", &Level::DEBUG));
        assert!(!filter.would_enable(PROTOCOL_TARGET, &Level::TRACE));

        let filter = build_filter(5, true, false);
        assert!(!filter.would_enable("cp2k_shell", &Level::ERROR));
    }

    #[test]
    fn trace_protocol_enables_only_the_process_module() {
        let filter = build_filter(0, false, true);
        assert!(filter.would_enable(PROTOCOL_TARGET, &Level::TRACE));
        assert!(!filter.would_enable("cp2k_shell::engine::session", &Level::DEBUG));
    }

    #[test]
    #[serial]
    fn file_logging_can_be_added_to_global_logger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let file = File::create(log_path.clone()).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true);
        let subscriber = tracing_subscriber::registry()
            .with(build_filter(0, false, true))
            .with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            trace!(target: PROTOCOL_TARGET, "Sending: GET_E 1");
            debug!(target: "cp2k_shell::engine::session", "Hidden message");
        });

        thread::sleep(Duration::from_millis(100));

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Sending: GET_E 1"));
        assert!(content.contains("TRACE"));
        assert!(!content.contains("Hidden message"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path), false);
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
