use anyhow::Context;
use sharemirror_lib::config::{self, AppConfig};
use sharemirror_lib::logging::{LogConfig, SizeRotatingWriter, SyncLog, TracingLog};
use sharemirror_lib::storage::{LocalStorage, RemoteStore, WebDavClient};
use sharemirror_lib::{SyncEngine, SyncReport};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;

/// 初始化日志系统
fn init_logging(log_dir: &Path, config: &LogConfig) {
    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let level = config.tracing_level();
    let env_filter = || {
        let mut filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
        for directive in ["hyper=warn", "reqwest=warn"] {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    };

    match SizeRotatingWriter::new(log_dir, config.max_size_mb) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false);

            // 在 debug 模式下也输出到控制台
            let console_layer = cfg!(debug_assertions)
                .then(|| tracing_subscriber::fmt::layer().with_target(false));

            let subscriber = tracing_subscriber::registry()
                .with(env_filter())
                .with(file_layer)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(e) => {
            // 文件日志创建失败，回退到控制台
            let subscriber = tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().with_target(false));
            let _ = tracing::subscriber::set_global_default(subscriber);
            tracing::warn!("无法创建日志文件 {}: {}", log_dir.display(), e);
        }
    }
}

/// 读取配置、建立连接并执行一次同步
async fn run(data_dir: &Path) -> anyhow::Result<SyncReport> {
    let config = AppConfig::load(data_dir).context("无法读取配置")?;
    let sync_root = config.sync_root(data_dir);

    // 分享令牌不写入日志
    tracing::info!(
        "使用配置启动: server={}, syncDir={}",
        config.server,
        sync_root.display()
    );

    let tls_root = match config.ca_cert_path(data_dir) {
        Some(path) => {
            tracing::debug!("加载信任证书: {}", path.display());
            Some(
                std::fs::read(&path)
                    .with_context(|| format!("无法读取证书 {}", path.display()))?,
            )
        }
        None => None,
    };

    let client = WebDavClient::new(
        &config.server,
        &config.share,
        tls_root.as_deref(),
        Duration::from_secs(config.timeout_secs),
    )
    .context("无法创建 WebDAV 客户端")?;

    let remote: Arc<dyn RemoteStore> = Arc::new(client);
    let log: Arc<dyn SyncLog> = Arc::new(TracingLog);
    let engine = SyncEngine::new(remote, LocalStorage::new(sync_root), log);

    let report = engine.run().await.context("同步失败")?;
    Ok(report)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let data_dir = config::data_dir();
    init_logging(&data_dir, &config::load_log_config(&data_dir));

    match run(&data_dir).await {
        Ok(report) => {
            tracing::info!(
                "Success: {}",
                serde_json::to_string(&report).unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
