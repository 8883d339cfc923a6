//! 应用配置模块

use crate::error::ConfigError;
use crate::logging::LogConfig;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "config.json";
/// 默认信任证书文件名
pub const CA_CERT_FILE_NAME: &str = "cacert.pem";
/// 覆盖数据目录的环境变量
pub const HOME_ENV: &str = "SHAREMIRROR_HOME";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// 云服务器地址，例如 https://cloud.example.com
    pub server: String,
    /// 分享令牌（分享链接 /s/ 后面的部分）
    pub share: String,
    /// 本地同步根目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_dir: Option<PathBuf>,
    /// 额外信任的 PEM 证书
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_timeout_secs() -> u64 {
    crate::storage::IO_TIMEOUT_SECS
}

impl AppConfig {
    /// 从数据目录读取并校验配置
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Invalid { path, source })?;

        config.validate()?;
        Ok(config)
    }

    /// 检查服务器地址带有 http/https 协议，分享令牌非空
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.server) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::MissingScheme(self.server.clone())),
        }

        if self.share.trim().is_empty() {
            return Err(ConfigError::EmptyShare);
        }

        Ok(())
    }

    /// 同步根目录，未配置时为数据目录下的 sync
    pub fn sync_root(&self, config_dir: &Path) -> PathBuf {
        self.sync_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("sync"))
    }

    /// 证书路径：显式配置优先，否则使用数据目录下存在的 cacert.pem
    pub fn ca_cert_path(&self, config_dir: &Path) -> Option<PathBuf> {
        self.ca_cert.clone().or_else(|| {
            let default = config_dir.join(CA_CERT_FILE_NAME);
            default.is_file().then_some(default)
        })
    }
}

/// 日志配置，配置文件缺失或无效时使用默认值
///
/// 日志需要在配置校验之前初始化，所以这里单独读取 log 部分。
pub fn load_log_config(config_dir: &Path) -> LogConfig {
    fs::read_to_string(config_dir.join(CONFIG_FILE_NAME))
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|config| serde_json::from_value::<LogConfig>(config.get("log")?.clone()).ok())
        .unwrap_or_default()
}

/// 数据目录：环境变量优先，否则为系统配置目录下的 sharemirror
pub fn data_dir() -> PathBuf {
    std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|p| p.join("sharemirror")))
        .unwrap_or_else(|| PathBuf::from(".sharemirror"))
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) {
        fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_load_valid_config() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{"server": "https://cloud.domain.com", "share": "XXXX"}"#,
        );

        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.server, "https://cloud.domain.com");
        assert_eq!(config.share, "XXXX");
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.sync_root(dir.path()), dir.path().join("sync"));
        assert!(config.log.enabled);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "server = cloud.domain.com");

        let err = AppConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = AppConfig::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_requires_scheme() {
        let mut config: AppConfig =
            serde_json::from_str(r#"{"server": "https://cloud.domain.com", "share": "XXX"}"#)
                .unwrap();
        assert!(config.validate().is_ok());

        config.server = "cloud.domain.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingScheme(_))
        ));

        config.server = "ftp://cloud.domain.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingScheme(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_share() {
        let config: AppConfig =
            serde_json::from_str(r#"{"server": "http://cloud.domain.com", "share": " "}"#)
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyShare)));
    }

    #[test]
    fn test_ca_cert_defaults_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let config: AppConfig =
            serde_json::from_str(r#"{"server": "https://c.example", "share": "s"}"#).unwrap();
        assert_eq!(config.ca_cert_path(dir.path()), None);

        fs::write(dir.path().join(CA_CERT_FILE_NAME), "pem").unwrap();
        assert_eq!(
            config.ca_cert_path(dir.path()),
            Some(dir.path().join(CA_CERT_FILE_NAME))
        );
    }

    #[test]
    fn test_log_config_read_without_validation() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), r#"{"server": "bad", "log": {"level": "warn"}}"#);
        assert_eq!(load_log_config(dir.path()).level, "warn");

        let empty = TempDir::new().unwrap();
        assert_eq!(load_log_config(empty.path()).level, "info");
    }
}
