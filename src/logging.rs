use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle, WriteMode};
use std::path::Path;

/// Initialize logging. In debug mode, logs to stderr and, when a log directory
/// is configured, duplicates everything to a file there.
/// In release mode, logs errors only to file with rotation (stderr when no
/// directory is configured).
pub fn init(log_dir: Option<&Path>) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let logger = match (cfg!(debug_assertions), log_dir) {
        (true, Some(dir)) => Logger::try_with_env_or_str("debug")?
            .log_to_file(file_spec(dir))
            .duplicate_to_stderr(Duplicate::All),
        (true, None) => Logger::try_with_env_or_str("info")?.log_to_stderr(),
        (false, Some(dir)) => Logger::try_with_env_or_str("error")?
            .log_to_file(file_spec(dir))
            .rotate(
                flexi_logger::Criterion::Size(10_000_000), // 10MB
                flexi_logger::Naming::Numbers,
                flexi_logger::Cleanup::KeepLogFiles(3),
            ),
        (false, None) => Logger::try_with_env_or_str("error")?.log_to_stderr(),
    };

    logger.write_mode(WriteMode::BufferAndFlush).start()
}

fn file_spec(dir: &Path) -> FileSpec {
    FileSpec::default().directory(dir).basename("civic-search")
}
