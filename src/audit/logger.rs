use crate::report::ExecutionResult;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only forensic trail of executed and rejected commands
#[derive(Debug, Clone)]
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        Self::with_path(Self::default_log_path()?)
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/ripper/audit.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set",
            )
        })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("ripper")
            .join("audit.log"))
    }

    /// Log a command execution
    pub fn log_execution(
        &self,
        command: &str,
        root: &Path,
        result: &ExecutionResult,
    ) -> std::io::Result<()> {
        let status = if result.timed_out {
            "timeout".to_string()
        } else if result.cancelled {
            "cancelled".to_string()
        } else if result.error.is_some() {
            "spawn-error".to_string()
        } else {
            match result.exit_code {
                Some(code) => format!("exit:{}", code),
                None => "signal".to_string(),
            }
        };

        self.append(&format!(
            "[{}] [{}] [{}] [{}ms] {}\n",
            root.display(),
            status,
            if result.truncated { "truncated" } else { "complete" },
            result.duration.as_millis(),
            command.escape_debug()
        ))
    }

    /// Log a validation rejection for forensics
    ///
    /// Command and detail are escaped so every entry stays on one line.
    /// Repeated rejections of the same shape point at generator misbehavior
    /// or prompt injection in explored content.
    pub fn log_rejection(
        &self,
        command: &str,
        reason: &str,
        detail: &str,
        root: &Path,
    ) -> std::io::Result<()> {
        self.append(&format!(
            "[{}] [VALIDATION-REJECTED] command=\"{}\" reason=\"{}\" detail=\"{}\"\n",
            root.display(),
            command.escape_debug(),
            reason,
            detail.escape_debug()
        ))
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        // Check and rotate log if needed
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(format!("[{}] [{}] {}", timestamp, user, entry).as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: audit.log -> audit.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn finished(exit_code: i32) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(exit_code),
            duration: Duration::from_millis(12),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_logger() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested").join("test.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        assert_eq!(logger.log_path(), log_path);
        assert!(log_path.parent().unwrap().exists());
    }

    #[test]
    fn test_log_execution() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        let root = Path::new("/test/repo");

        logger.log_execution("rg -i TODO src/", root, &finished(0)).unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("rg -i TODO src/"));
        assert!(content.contains("/test/repo"));
        assert!(content.contains("exit:0"));
        assert!(content.contains("12ms"));
    }

    #[test]
    fn test_log_timeout_and_nonzero() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        let root = Path::new("/test/repo");

        let timed_out = ExecutionResult {
            timed_out: true,
            truncated: true,
            ..Default::default()
        };
        logger.log_execution("tree -L 9", root, &timed_out).unwrap();
        logger.log_execution("diff a b", root, &finished(1)).unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[timeout] [truncated]"));
        assert!(lines[1].contains("exit:1"));
    }

    #[test]
    fn test_log_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        let root = Path::new("/test/repo");

        // Write a large entry to trigger rotation
        let large_command = "rg ".to_string() + &"x".repeat(MAX_LOG_SIZE as usize);
        logger.log_execution(&large_command, root, &finished(0)).unwrap();

        // Write another entry - should trigger rotation
        logger.log_execution("ls", root, &finished(0)).unwrap();

        let backup_path = log_path.with_extension("log.1");
        assert!(backup_path.exists());

        assert!(log_path.exists());
        let metadata = fs::metadata(&log_path).unwrap();
        assert!(metadata.len() < MAX_LOG_SIZE);
    }

    #[test]
    fn test_log_rejection() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        let root = Path::new("/test/repo");

        logger
            .log_rejection(
                "cat file.txt | grep foo",
                "blocked_pattern:pipe",
                "Pipes (|)",
                root,
            )
            .unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("VALIDATION-REJECTED"));
        assert!(content.contains("cat file.txt | grep foo"));
        assert!(content.contains("blocked_pattern:pipe"));
    }

    #[test]
    fn test_embedded_newlines_cannot_forge_entries() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let logger = AuditLogger::with_path(&log_path).unwrap();
        let root = Path::new("/test/repo");

        let forged = "ls\n[2026-01-01T00:00:00+00:00] [root] [/test/repo] [exit:0] [complete] [1ms] cat \"x\"";
        logger.log_execution(forged, root, &finished(0)).unwrap();
        logger
            .log_rejection(forged, "parse_error", "line one\nline two", root)
            .unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[12ms] ls\\n[2026"));
        assert!(lines[1].contains("command=\"ls\\n[2026"));
        assert!(lines[1].contains("cat \\\"x\\\"\" reason="));
        assert!(lines[1].contains("detail=\"line one\\nline two\""));
    }
}
