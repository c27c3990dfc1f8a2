//! User-Agent 轮换器
//!
//! 优先使用外部大池；外部池不可用时回退到内置列表，保证永不返回空值。

use std::path::Path;

use rand::seq::IndexedRandom;
use tracing::{info, warn};

use crate::utils::read_lines;

const FALLBACK_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:90.0) Gecko/20100101 Firefox/90.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36",
];

#[derive(Debug, Clone)]
pub struct UserAgentRotator {
    pool: Vec<String>,
}

impl UserAgentRotator {
    /// 仅使用内置列表
    pub fn builtin() -> Self {
        Self {
            pool: FALLBACK_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 使用给定的池；空池回退到内置列表
    pub fn with_pool(pool: Vec<String>) -> Self {
        if pool.is_empty() {
            return Self::builtin();
        }
        Self { pool }
    }

    /// 从外部池文件加载，任何读取失败都回退到内置列表
    pub async fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };

        match read_lines(path).await {
            Ok(pool) if !pool.is_empty() => {
                info!("已加载外部 UA 池 ({} 条)", pool.len());
                Self { pool }
            }
            Ok(_) => {
                warn!("UA 池 {} 为空，使用内置列表", path.display());
                Self::builtin()
            }
            Err(e) => {
                warn!("读取 UA 池失败: {}，使用内置列表", e);
                Self::builtin()
            }
        }
    }

    /// 随机选取一个 UA
    pub fn next(&self) -> String {
        self.pool
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_AGENTS[0].to_string())
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }
}

impl Default for UserAgentRotator {
    fn default() -> Self {
        Self::builtin()
    }
}
