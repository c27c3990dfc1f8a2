//! 代理池 (Proxy Pool)
//!
//! 轮询游标 + 永久剔除。被标记失效的代理不会自动恢复。

use std::fmt;
use std::path::Path;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::utils::read_lines;

/// 代理引用 (URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyRef(String);

impl ProxyRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<ProxyRef>,
    cursor: usize,
}

/// 代理池
///
/// 游标始终指向一个存活条目，或池为空。
#[derive(Debug, Default)]
pub struct ProxyPool {
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// 从内存列表构建，保持首次出现的顺序并去重
    pub fn from_list<I, S>(proxies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: IndexSet<ProxyRef> = proxies
            .into_iter()
            .map(|p| p.into().trim().to_string())
            .filter(|p| !p.is_empty())
            .map(ProxyRef)
            .collect();

        Self {
            state: Mutex::new(PoolState {
                entries: unique.into_iter().collect(),
                cursor: 0,
            }),
        }
    }

    /// 从换行分隔的文件加载。文件不存在时返回空池。
    pub async fn load(path: &Path) -> Result<Self> {
        let lines = read_lines(path).await?;
        let pool = Self::from_list(lines);
        info!("已加载 {} 个代理", pool.len());
        Ok(pool)
    }

    /// 取出下一个代理并推进游标
    pub fn next(&self) -> Option<ProxyRef> {
        let mut state = self.state.lock();
        if state.entries.is_empty() {
            return None;
        }

        let proxy = state.entries[state.cursor].clone();
        state.cursor = (state.cursor + 1) % state.entries.len();
        Some(proxy)
    }

    /// 永久剔除失效代理，下一次 `next()` 起生效
    pub fn mark_bad(&self, proxy: &ProxyRef) -> bool {
        let mut state = self.state.lock();
        let Some(idx) = state.entries.iter().position(|p| p == proxy) else {
            debug!("忽略未知或已剔除的代理: {}", proxy);
            return false;
        };

        state.entries.remove(idx);
        if idx < state.cursor {
            state.cursor -= 1;
        }
        if state.cursor >= state.entries.len() {
            state.cursor = 0;
        }

        warn!(
            "已剔除失效代理 {}，剩余 {} 个",
            proxy,
            state.entries.len()
        );
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(pool: &ProxyPool, n: usize) -> Vec<String> {
        (0..n)
            .filter_map(|_| pool.next())
            .map(|p| p.to_string())
            .collect()
    }

    #[test]
    fn round_robin_in_insertion_order() {
        let pool = ProxyPool::from_list(["http://a", "http://b", "http://c"]);
        assert_eq!(
            refs(&pool, 4),
            vec!["http://a", "http://b", "http://c", "http://a"]
        );
    }

    #[test]
    fn duplicates_and_blank_entries_are_dropped() {
        let pool = ProxyPool::from_list(["http://a", " ", "http://b", "http://a "]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn marked_proxy_never_returns() {
        let pool = ProxyPool::from_list(["http://a", "http://b", "http://c"]);
        assert_eq!(pool.next().unwrap().as_str(), "http://a");
        assert!(pool.mark_bad(&ProxyRef::new("http://b")));

        let seen = refs(&pool, 6);
        assert!(seen.iter().all(|p| p != "http://b"));
        assert_eq!(seen[0], "http://c");
    }

    #[test]
    fn removing_entry_before_cursor_keeps_rotation_stable() {
        let pool = ProxyPool::from_list(["http://a", "http://b", "http://c"]);
        pool.next();
        pool.next();
        pool.mark_bad(&ProxyRef::new("http://a"));
        assert_eq!(pool.next().unwrap().as_str(), "http://c");
        assert_eq!(pool.next().unwrap().as_str(), "http://b");
    }

    #[test]
    fn cursor_wraps_when_tail_is_removed() {
        let pool = ProxyPool::from_list(["http://a", "http://b"]);
        pool.next();
        pool.mark_bad(&ProxyRef::new("http://b"));
        assert_eq!(pool.next().unwrap().as_str(), "http://a");
    }

    #[test]
    fn exhausted_pool_yields_none_forever() {
        let pool = ProxyPool::from_list(["http://a", "http://b"]);
        pool.mark_bad(&ProxyRef::new("http://a"));
        pool.mark_bad(&ProxyRef::new("http://b"));
        assert!(pool.is_empty());
        assert!(pool.next().is_none());
        assert!(pool.next().is_none());
        assert!(!pool.mark_bad(&ProxyRef::new("http://a")));
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ProxyPool::load(&dir.path().join("proxies.txt")).await.unwrap();
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn file_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        tokio::fs::write(&path, "http://a\n\nhttp://b\nhttp://a\n")
            .await
            .unwrap();
        let pool = ProxyPool::load(&path).await.unwrap();
        assert_eq!(refs(&pool, 2), vec!["http://a", "http://b"]);
    }
}
