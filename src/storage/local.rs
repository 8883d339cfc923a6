use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 同步根目录下的本地存储
///
/// 所有路径都是相对根目录、以 `/` 分隔的形式。
pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let base_path = path.into();
        let name = format!("local:{}", base_path.display());
        Self { base_path, name }
    }

    pub fn root(&self) -> &Path {
        &self.base_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.base_path.clone(), |acc, segment| acc.join(segment))
    }

    /// 写入整个文件，父目录不存在时递归创建，已有文件会被替换
    ///
    /// 内容先写入同目录下随机命名的临时文件再重命名到目标位置，
    /// 临时文件以独占方式创建，不会覆盖任何已有文件。
    pub async fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let full_path = self.resolve_path(path);
        let data = data.to_vec();

        // 使用 spawn_blocking 避免阻塞 async runtime
        tokio::task::spawn_blocking(move || write_blocking(&full_path, &data))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// 删除文件，若其所在目录因此变空且不是根目录，则一并删除该目录
    ///
    /// 只向上清理一层。返回是否删除了父目录。
    pub async fn remove(&self, path: &str) -> io::Result<bool> {
        let full_path = self.resolve_path(path);
        fs::remove_file(&full_path).await?;

        let parent = match full_path.parent() {
            Some(parent) if parent != self.base_path => parent,
            _ => return Ok(false),
        };

        let mut entries = fs::read_dir(parent).await?;
        if entries.next_entry().await?.is_some() {
            return Ok(false);
        }

        fs::remove_dir(parent).await?;
        Ok(true)
    }
}

fn write_blocking(full_path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = full_path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory")
    })?;
    // 目录已存在不算错误
    std::fs::create_dir_all(parent)?;

    // 写入或重命名失败时 NamedTempFile 被丢弃，临时文件随之删除
    let mut temp = tempfile::Builder::new()
        .prefix(".sharemirror-")
        .suffix(".part")
        .tempfile_in(parent)?;
    temp.write_all(data)?;
    temp.persist(full_path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("a/b/c.txt", b"hello").await.unwrap();

        let written = std::fs::read(dir.path().join("a").join("b").join("c.txt")).unwrap();
        assert_eq!(written, b"hello");
        // 不留下临时文件
        let names: Vec<_> = std::fs::read_dir(dir.path().join("a").join("b"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("c.txt")]);
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"old content").unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write("a.txt", b"new").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_write_leaves_dot_part_siblings_alone() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write(".x.part", b"keepme").await.unwrap();
        storage.write("x", b"data").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join(".x.part")).unwrap(), b"keepme");
        assert_eq!(std::fs::read(dir.path().join("x")).unwrap(), b"data");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_write_onto_directory_fails_without_leftovers() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("clash").join("inner")).unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.write("clash", b"file").await.is_err());

        assert!(dir.path().join("clash").is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parent() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("old.txt"), b"x").unwrap();
        let storage = LocalStorage::new(dir.path());

        let pruned = storage.remove("docs/old.txt").await.unwrap();

        assert!(pruned);
        assert!(!dir.path().join("docs").exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_remove_keeps_non_empty_parent() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("old.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("docs").join("keep.txt"), b"y").unwrap();
        let storage = LocalStorage::new(dir.path());

        let pruned = storage.remove("docs/old.txt").await.unwrap();

        assert!(!pruned);
        assert!(dir.path().join("docs").join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_remove_prunes_only_one_level() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a").join("b");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("f.txt"), b"x").unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.remove("a/b/f.txt").await.unwrap();

        assert!(!deep.exists());
        assert!(dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn test_remove_never_prunes_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("sync");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("last.txt"), b"x").unwrap();
        let storage = LocalStorage::new(&root);

        let pruned = storage.remove("last.txt").await.unwrap();

        assert!(!pruned);
        assert!(root.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let err = storage.remove("missing.txt").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
