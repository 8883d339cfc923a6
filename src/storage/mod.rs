pub mod local;
pub mod webdav;

use crate::error::TransportError;
use async_trait::async_trait;

pub use local::LocalStorage;
pub use webdav::WebDavClient;

// ============ 公共常量 ============

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
/// 单次请求超时（秒）- 列表和下载
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程共享目录抽象接口
///
/// 同步核心只通过这两个操作访问远程端，认证和 TLS 都由实现自行处理。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 获取整个共享目录的原始列表（不限深度）
    async fn list_remote_tree(&self) -> Result<String, TransportError>;

    /// 下载单个文件的全部内容，`path` 为相对同步根目录的路径
    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, TransportError>;

    /// 列表中 href 的固定前缀，解析列表时需要剥离
    fn service_prefix(&self) -> &str;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}
