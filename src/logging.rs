//! 日志模块 - 提供文件日志、大小管理和可注入的日志接口

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

/// 日志文件名
pub const LOG_FILE_NAME: &str = "sharemirror.log";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

// ============ 注入式日志接口 ============

/// 同步组件使用的日志能力
///
/// 组件不直接访问全局 logger，而是由调用方显式传入。
pub trait SyncLog: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str);

    fn debug(&self, _message: &str) {}
}

/// 转发到 tracing 的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl SyncLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }
}

/// 记录所有消息，供测试断言
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryLog {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

#[cfg(test)]
impl SyncLog for MemoryLog {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

// ============ 文件日志 ============

struct RotatingFile {
    file_path: PathBuf,
    max_size: u64,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl RotatingFile {
    fn lock(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        // 某个写入线程 panic 后继续使用同一个文件
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn oversized(&self) -> bool {
        fs::metadata(&self.file_path)
            .map(|m| m.len() > self.max_size)
            .unwrap_or(false)
    }

    /// 文件超过上限时轮转为 .log.old 并重新打开
    ///
    /// 轮转失败时重新打开原文件继续追加，并返回轮转的错误。
    fn rotate_if_needed(&self) -> io::Result<()> {
        if !self.oversized() {
            return Ok(());
        }

        let mut guard = self.lock();
        if let Some(mut w) = guard.take() {
            let _ = w.flush();
        }
        let rotated = rotate_log(&self.file_path);
        *guard = Some(open_log(&self.file_path)?);
        rotated
    }
}

fn open_log(file_path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;
    Ok(BufWriter::new(file))
}

/// 轮转日志文件
fn rotate_log(file_path: &Path) -> io::Result<()> {
    let backup_path = file_path.with_extension("log.old");

    if backup_path.exists() {
        fs::remove_file(&backup_path)?;
    }

    fs::rename(file_path, &backup_path)
}

/// 带大小限制的日志写入器
#[derive(Clone)]
pub struct SizeRotatingWriter {
    inner: Arc<RotatingFile>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE_NAME);
        let max_size = (max_size_mb as u64) * 1024 * 1024;

        let inner = RotatingFile {
            file_path,
            max_size,
            writer: Mutex::new(None),
        };
        // 启动时检查现有文件大小，轮转失败不影响继续写入
        let _ = inner.rotate_if_needed();
        {
            let mut guard = inner.lock();
            if guard.is_none() {
                *guard = Some(open_log(&inner.file_path)?);
            }
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

/// 日志写入器包装
pub struct LogWriter {
    inner: Arc<RotatingFile>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = {
            let mut guard = self.inner.lock();
            if guard.is_none() {
                *guard = Some(open_log(&self.inner.file_path)?);
            }
            let writer = guard
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Writer not available"))?;
            let written = writer.write(buf)?;
            writer.flush()?;
            written
        };

        let _ = self.inner.rotate_if_needed();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_defaults_from_partial_json() {
        let config: LogConfig = serde_json::from_str(r#"{"level": "debug"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_size_mb, 5);
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = LogConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_writer_appends_to_log_file() {
        let dir = TempDir::new().unwrap();
        let writer = SizeRotatingWriter::new(dir.path(), 1).unwrap();

        let mut w = writer.make_writer();
        w.write_all(b"first line\n").unwrap();
        w.flush().unwrap();

        let content = fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        assert_eq!(content, "first line\n");
    }

    #[test]
    fn test_oversized_log_is_rotated_on_open() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join(LOG_FILE_NAME);
        fs::write(&log_path, vec![b'x'; 1024 * 1024 + 1]).unwrap();

        let _writer = SizeRotatingWriter::new(dir.path(), 1).unwrap();

        assert!(dir.path().join("sharemirror.log.old").exists());
        assert_eq!(fs::metadata(&log_path).unwrap().len(), 0);
    }

    #[test]
    fn test_failed_rotation_keeps_logging() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join(LOG_FILE_NAME);
        fs::write(&log_path, vec![b'x'; 1024 * 1024 + 1]).unwrap();
        // 备份位置被非空目录占用，轮转无法完成
        let backup = dir.path().join("sharemirror.log.old");
        fs::create_dir(&backup).unwrap();
        fs::write(backup.join("blocker"), b"x").unwrap();

        let writer = SizeRotatingWriter::new(dir.path(), 1).unwrap();
        let mut w = writer.make_writer();
        w.write_all(b"after\n").unwrap();
        w.write_all(b"again\n").unwrap();
        w.flush().unwrap();

        let content = fs::read(&log_path).unwrap();
        assert!(content.ends_with(b"after\nagain\n"));
        assert!(backup.is_dir());
    }

    #[test]
    fn test_memory_log_records_messages() {
        let log = MemoryLog::default();
        log.info("hello");
        log.error("boom");
        log.debug("ignored");
        assert_eq!(*log.infos.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*log.errors.lock().unwrap(), vec!["boom".to_string()]);
    }
}
