//! 通用辅助工具集 (General Utilities)
//!
//! 提供 URI 规范化、列表文件读取及原子化 I/O 操作。

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use url::Url;

/// 执行 URI 规范化 (URI Normalization)
///
/// 将相对路径或 Protocol-relative URL 转换为绝对定位符。
pub fn to_absolute_url(base: &Url, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }

    if let Some(path_without_slashes) = href.strip_prefix("//") {
        return format!("{}://{}", base.scheme(), path_without_slashes);
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// 读取换行分隔的列表文件
///
/// 去除首尾空白并忽略空行；文件不存在视为空列表。
pub async fn read_lines(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// 写文件，必要时创建父目录
pub async fn save_file(path: impl AsRef<Path>, data: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, data).await?;
    Ok(())
}
