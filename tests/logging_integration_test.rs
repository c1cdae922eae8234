//! File logging. Lives in its own test binary because it installs the
//! global subscriber.

use agora::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl, RotationPolicy};
use tempfile::TempDir;

#[test]
fn test_file_output_is_json() {
    let dir = TempDir::new().unwrap();
    let config = LogConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        log_dir: Some(dir.path().to_path_buf()),
        enable_console: false,
        rotation: RotationPolicy::Never,
    };

    let logger = LoggerImpl::init(&config).unwrap();
    assert!(logger.has_file_output());
    tracing::info!(agent = "LatteBot", "agent connected");
    tracing::trace!("below the configured level");
    drop(logger);

    let contents = std::fs::read_to_string(dir.path().join("agora.log")).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let connected = lines
        .iter()
        .find(|l| l["fields"]["message"] == "agent connected")
        .expect("event missing from log file");
    assert_eq!(connected["fields"]["agent"], "LatteBot");
    assert_eq!(connected["level"], "INFO");
    assert!(!contents.contains("below the configured level"));
}
