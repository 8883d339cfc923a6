//! 错误类型
//!
//! 一次同步运行中任何一步失败都会以 [`MirrorError`] 的形式返回给调用方，
//! 不做重试，也不返回部分结果。

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 同步核心的错误分类
#[derive(Debug, Error)]
pub enum MirrorError {
    /// 远程目录列表无法解析
    #[error("malformed remote listing: {0}")]
    Parse(String),

    /// 列表条目中的路径编码非法
    #[error("invalid path encoding in listing entry {href:?}: {reason}")]
    PathDecode { href: String, reason: String },

    /// 本地目录遍历失败
    #[error("failed to scan local directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 远程传输失败（网络、认证、HTTP 状态）
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 应用差异时写入或删除失败
    #[error("{phase} failed for {path:?}: {source}")]
    Sync {
        phase: Phase,
        path: String,
        #[source]
        source: SyncCause,
    },
}

impl MirrorError {
    pub(crate) fn sync(phase: Phase, path: &str, source: impl Into<SyncCause>) -> Self {
        Self::Sync {
            phase,
            path: path.to_string(),
            source: source.into(),
        }
    }
}

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Download,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Download => write!(f, "download"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// 单个文件同步失败的底层原因
#[derive(Debug, Error)]
pub enum SyncCause {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// 远程传输错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 构建 HTTP 客户端失败（证书、TLS 配置等）
    #[error("failed to set up HTTP client: {0}")]
    Setup(String),

    /// 请求未能完成
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 服务器返回非 2xx 状态
    #[error("unexpected status {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing scheme (http or https) in server {0:?}")]
    MissingScheme(String),

    #[error("share token must not be empty")]
    EmptyShare,
}

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_names_phase_and_path() {
        let err = MirrorError::sync(
            Phase::Delete,
            "docs/a.txt",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("delete failed for \"docs/a.txt\""), "{msg}");
        assert!(msg.contains("denied"));
    }
}
