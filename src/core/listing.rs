//! WebDAV 目录列表解析
//!
//! 把 PROPFIND 返回的 multistatus 文档展开为 [`FileIndex`]。
//! 命名空间前缀被忽略，只按元素的本地名匹配。

use super::comparator::FileIndex;
use crate::error::{MirrorError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Url;

/// 列表中的一个条目（展开之前）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// 原始 href，URL 编码且带服务路径前缀
    pub href: String,
    /// 是否为目录（collection）
    pub is_collection: bool,
    /// 文件大小，目录为 0
    pub size: u64,
}

#[derive(Default)]
struct EntryBuilder {
    href: Option<String>,
    is_collection: bool,
    size: u64,
    length_text: String,
}

impl EntryBuilder {
    fn finish(self) -> Result<RemoteEntry> {
        let href = self
            .href
            .ok_or_else(|| MirrorError::Parse("response without href".to_string()))?;
        Ok(RemoteEntry {
            href,
            is_collection: self.is_collection,
            size: self.size,
        })
    }
}

fn parse_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> MirrorError {
    MirrorError::Parse(format!("at byte {}: {}", reader.buffer_position(), err))
}

/// 按文档顺序解析出所有条目
pub fn parse_entries(payload: &str) -> Result<Vec<RemoteEntry>> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    let mut current: Option<EntryBuilder> = None;
    let mut entries = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| parse_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                open_element(&e, &stack, &mut seen_root, &mut current)
                    .map_err(|msg| parse_error(&reader, msg))?;
                stack.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                open_element(&e, &stack, &mut seen_root, &mut current)
                    .map_err(|msg| parse_error(&reader, msg))?;
                if e.local_name().as_ref() == b"response" {
                    return Err(parse_error(&reader, "empty response element"));
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| parse_error(&reader, e))?;
                append_text(&text, &stack, &mut current).map_err(|msg| parse_error(&reader, msg))?;
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                append_text(&text, &stack, &mut current).map_err(|msg| parse_error(&reader, msg))?;
            }
            Event::End(e) => {
                let name = e.local_name();
                stack.pop();
                match name.as_ref() {
                    b"getcontentlength" => {
                        if let Some(entry) = current.as_mut() {
                            let text = entry.length_text.trim();
                            if !text.is_empty() {
                                entry.size = text.parse().map_err(|_| {
                                    parse_error(&reader, format!("invalid content length {text:?}"))
                                })?;
                            }
                        }
                    }
                    b"response" => {
                        if let Some(entry) = current.take() {
                            entries.push(entry.finish()?);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(MirrorError::Parse("missing multistatus root element".to_string()));
    }
    if !stack.is_empty() {
        return Err(MirrorError::Parse("unexpected end of document".to_string()));
    }

    Ok(entries)
}

fn open_element(
    e: &BytesStart<'_>,
    stack: &[Vec<u8>],
    seen_root: &mut bool,
    current: &mut Option<EntryBuilder>,
) -> std::result::Result<(), String> {
    let name = e.local_name();
    let name = name.as_ref();

    let Some(parent) = stack.last() else {
        if *seen_root {
            return Err("multiple root elements".to_string());
        }
        if name != b"multistatus" {
            return Err(format!(
                "unexpected root element <{}>",
                String::from_utf8_lossy(name)
            ));
        }
        *seen_root = true;
        return Ok(());
    };

    match name {
        b"response" if parent.as_slice() == b"multistatus" => {
            *current = Some(EntryBuilder::default());
        }
        b"collection" if parent.as_slice() == b"resourcetype" => {
            if let Some(entry) = current.as_mut() {
                entry.is_collection = true;
            }
        }
        b"getcontentlength" => {
            if let Some(entry) = current.as_mut() {
                entry.length_text.clear();
            }
        }
        _ => {}
    }
    Ok(())
}

fn append_text(
    text: &str,
    stack: &[Vec<u8>],
    current: &mut Option<EntryBuilder>,
) -> std::result::Result<(), String> {
    let Some(top) = stack.last() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err("text outside of root element".to_string());
    };

    if let Some(entry) = current.as_mut() {
        match top.as_slice() {
            b"href" => entry.href.get_or_insert_with(String::new).push_str(text),
            b"getcontentlength" => entry.length_text.push_str(text),
            _ => {}
        }
    }
    Ok(())
}

/// 解析列表并展开为文件索引
///
/// 第一个条目是被查询的根目录本身，总是丢弃；目录条目被跳过。
/// 任何条目出错都会使整个解析失败。
pub fn parse_listing(payload: &str, prefix: &str) -> Result<FileIndex> {
    let entries = parse_entries(payload)?;
    if entries.is_empty() {
        // 空列表不能当作"远程为空"，否则会删除整个本地目录
        return Err(MirrorError::Parse("listing contains no entries".to_string()));
    }

    let mut index = FileIndex::new();
    for entry in entries.into_iter().skip(1) {
        if entry.is_collection {
            continue;
        }
        let path = decode_href(&entry.href, prefix)?;
        index.insert(path, entry.size);
    }

    Ok(index)
}

/// 剥离服务路径前缀并解码为相对路径
pub fn decode_href(href: &str, prefix: &str) -> Result<String> {
    let decode_error = |reason: &str| MirrorError::PathDecode {
        href: href.to_string(),
        reason: reason.to_string(),
    };

    // 有的服务器返回完整 URL 而不是绝对路径
    let absolute;
    let path = if href.starts_with("http://") || href.starts_with("https://") {
        absolute = Url::parse(href).map_err(|e| decode_error(&e.to_string()))?;
        absolute.path()
    } else {
        href
    };

    let raw = path.strip_prefix(prefix).unwrap_or(path);
    check_escapes(raw).map_err(|reason| decode_error(&reason))?;

    let decoded = urlencoding::decode(raw).map_err(|_| decode_error("not valid UTF-8"))?;

    if decoded.is_empty() {
        return Err(decode_error("empty path"));
    }
    // 段内的 %2F 无法按段重新编码回同一个远程资源
    if decoded.split('/').count() != raw.split('/').count() {
        return Err(decode_error("encoded '/' inside a path segment"));
    }
    if decoded
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(decode_error("path escapes the share root"));
    }

    Ok(decoded.into_owned())
}

/// 每个 `%` 后必须跟两位十六进制数字
fn check_escapes(raw: &str) -> std::result::Result<(), String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(format!("invalid percent-escape at offset {}", i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
