use super::comparator::FileIndex;
use crate::error::{MirrorError, Result};
use crate::logging::SyncLog;
use std::io;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// 本地文件扫描器
///
/// 遍历同步根目录，生成与远程索引相同形式的 [`FileIndex`]。
/// 任何遍历错误都会中止扫描：不完整的本地视图会导致错误的删除。
pub struct FileScanner {
    log: Arc<dyn SyncLog>,
}

impl FileScanner {
    pub fn new(log: Arc<dyn SyncLog>) -> Self {
        Self { log }
    }

    /// 扫描根目录
    pub async fn scan(&self, root: &Path) -> Result<FileIndex> {
        self.log.info(&format!("开始扫描本地目录: {}", root.display()));

        // 使用 spawn_blocking 避免阻塞 async runtime
        let base = root.to_path_buf();
        let index = tokio::task::spawn_blocking(move || scan_blocking(&base))
            .await
            .map_err(|e| MirrorError::Scan {
                path: root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, e),
            })??;

        self.log.info(&format!("扫描完成: {} 个本地文件", index.len()));
        Ok(index)
    }
}

fn scan_error(path: &Path, source: io::Error) -> MirrorError {
    MirrorError::Scan {
        path: path.to_path_buf(),
        source,
    }
}

fn scan_blocking(root: &Path) -> Result<FileIndex> {
    let metadata = std::fs::metadata(root).map_err(|e| scan_error(root, e))?;
    if !metadata.is_dir() {
        return Err(scan_error(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "sync root is not a directory"),
        ));
    }

    let mut index = FileIndex::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            scan_error(&path, e.into())
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let size = entry
            .metadata()
            .map_err(|e| scan_error(entry.path(), e.into()))?
            .len();
        let relative = relative_path(root, entry.path())?;
        index.insert(relative, size);
    }

    Ok(index)
}

/// 计算相对根目录、以 `/` 分隔的路径
fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        scan_error(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "entry outside sync root"),
        )
    })?;

    let segments = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                scan_error(
                    path,
                    io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(segments.join("/"))
}
