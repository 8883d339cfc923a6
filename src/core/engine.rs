use crate::core::comparator::{self, DiffResult};
use crate::core::listing;
use crate::core::scanner::FileScanner;
use crate::error::{MirrorError, Phase, Result};
use crate::logging::SyncLog;
use crate::storage::{LocalStorage, RemoteStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// 同步报告，仅在整次运行成功时生成
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub start_time: i64,
    pub end_time: i64,
    pub local_files: usize,
    pub remote_files: usize,
    pub files_downloaded: usize,
    pub files_deleted: usize,
    pub dirs_pruned: usize,
    pub bytes_transferred: u64,
    /// 耗时（毫秒）
    pub duration: u64,
}

/// 差异计算结果及两侧索引规模
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub diff: DiffResult,
    pub local_files: usize,
    pub remote_files: usize,
    pub download_bytes: u64,
}

/// 应用阶段的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub files_downloaded: usize,
    pub files_deleted: usize,
    pub dirs_pruned: usize,
    pub bytes_transferred: u64,
}

/// 把差异应用到本地目录
///
/// 先完成全部下载，再开始删除。任何一个文件失败都会立即中止，
/// 剩余的下载和全部删除都不再执行。
pub struct Reconciler {
    remote: Arc<dyn RemoteStore>,
    local: Arc<LocalStorage>,
    log: Arc<dyn SyncLog>,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: Arc<LocalStorage>,
        log: Arc<dyn SyncLog>,
    ) -> Self {
        Self { remote, local, log }
    }

    pub async fn apply(&self, diff: &DiffResult) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        for path in &diff.to_download {
            // 错误由调用方统一报告
            let bytes = self.download(path).await.inspect_err(|e| {
                self.log.debug(&format!("下载失败，中止同步: {}", e));
            })?;
            stats.files_downloaded += 1;
            stats.bytes_transferred += bytes;
        }

        for path in &diff.to_delete {
            let pruned = self.delete(path).await.inspect_err(|e| {
                self.log.debug(&format!("删除失败，中止同步: {}", e));
            })?;
            stats.files_deleted += 1;
            if pruned {
                stats.dirs_pruned += 1;
            }
        }

        Ok(stats)
    }

    async fn download(&self, path: &str) -> Result<u64> {
        let data = self
            .remote
            .fetch_file(path)
            .await
            .map_err(|e| MirrorError::sync(Phase::Download, path, e))?;

        self.local
            .write(path, &data)
            .await
            .map_err(|e| MirrorError::sync(Phase::Download, path, e))?;

        self.log.info(&format!("已下载: {} ({} 字节)", path, data.len()));
        Ok(data.len() as u64)
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let pruned = self
            .local
            .remove(path)
            .await
            .map_err(|e| MirrorError::sync(Phase::Delete, path, e))?;

        self.log.info(&format!("已删除: {}", path));
        if pruned {
            self.log.debug(&format!("已清理空目录: {}", path));
        }
        Ok(pruned)
    }
}

/// 同步引擎
///
/// 单次运行：扫描本地、获取远程列表、计算差异、下载、删除，全部顺序执行。
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    local: Arc<LocalStorage>,
    log: Arc<dyn SyncLog>,
}

impl SyncEngine {
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStorage, log: Arc<dyn SyncLog>) -> Self {
        Self {
            remote,
            local: Arc::new(local),
            log,
        }
    }

    /// 只计算差异，不修改本地文件
    pub async fn plan(&self) -> Result<SyncPlan> {
        let scanner = FileScanner::new(self.log.clone());
        let local_index = scanner.scan(self.local.root()).await?;

        self.log
            .info(&format!("获取远程文件列表: {}", self.remote.name()));
        let payload = self.remote.list_remote_tree().await?;
        let remote_index = listing::parse_listing(&payload, self.remote.service_prefix())?;
        self.log
            .info(&format!("远程共 {} 个文件", remote_index.len()));

        let diff = comparator::diff(&local_index, &remote_index);
        Ok(SyncPlan {
            download_bytes: diff.download_bytes(&remote_index),
            local_files: local_index.len(),
            remote_files: remote_index.len(),
            diff,
        })
    }

    /// 运行同步任务
    pub async fn run(&self) -> Result<SyncReport> {
        let start_time = chrono::Utc::now().timestamp();
        let timer = Instant::now();

        self.log.info(&format!(
            "开始同步: {} -> {}",
            self.remote.name(),
            self.local.name()
        ));

        let plan = self.plan().await?;
        self.log.info(&format!(
            "待下载 {} 个文件 ({} 字节), 待删除 {} 个文件",
            plan.diff.to_download.len(),
            plan.download_bytes,
            plan.diff.to_delete.len()
        ));

        let reconciler = Reconciler::new(self.remote.clone(), self.local.clone(), self.log.clone());
        let stats = reconciler.apply(&plan.diff).await?;

        let report = SyncReport {
            start_time,
            end_time: chrono::Utc::now().timestamp(),
            local_files: plan.local_files,
            remote_files: plan.remote_files,
            files_downloaded: stats.files_downloaded,
            files_deleted: stats.files_deleted,
            dirs_pruned: stats.dirs_pruned,
            bytes_transferred: stats.bytes_transferred,
            duration: timer.elapsed().as_millis() as u64,
        };

        self.log.info(&format!(
            "同步成功: 下载 {} 个, 删除 {} 个, 传输 {} 字节, 耗时 {}ms",
            report.files_downloaded, report.files_deleted, report.bytes_transferred, report.duration
        ));

        Ok(report)
    }
}
