use std::collections::{BTreeSet, HashMap};

/// 相对路径（`/` 分隔，无前导 `/`）到文件大小的映射
///
/// 目录不会出现在索引中，它们由文件路径的前缀隐式表示。
pub type FileIndex = HashMap<String, u64>;

/// 差异结果
///
/// 两个集合互不相交；按字典序迭代，保证每次运行的处理顺序一致。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// 只存在于远程，或两边大小不同
    pub to_download: BTreeSet<String>,
    /// 只存在于本地
    pub to_delete: BTreeSet<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty() && self.to_delete.is_empty()
    }

    /// 需要下载的总字节数
    pub fn download_bytes(&self, remote: &FileIndex) -> u64 {
        self.to_download
            .iter()
            .filter_map(|path| remote.get(path))
            .sum()
    }
}

/// 比较本地与远程索引
///
/// 大小是唯一的变化依据：大小相同但内容不同的文件视为未变化。
pub fn diff(local: &FileIndex, remote: &FileIndex) -> DiffResult {
    let to_download = remote
        .iter()
        .filter(|(path, size)| local.get(*path) != Some(*size))
        .map(|(path, _)| path.clone())
        .collect();

    let to_delete = local
        .keys()
        .filter(|path| !remote.contains_key(*path))
        .cloned()
        .collect();

    DiffResult {
        to_download,
        to_delete,
    }
}
