//! 身份素材管理 (Identity Management)
//!
//! 聚合 UA 轮换、代理池与 Cookie 存储，为每次策略调用生成一次性快照。

pub mod agent;
pub mod cookies;
pub mod proxy;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::info;

pub use agent::UserAgentRotator;
pub use cookies::{Cookie, CookieStore};
pub use proxy::{ProxyPool, ProxyRef};

use crate::core::config::IdentityConfig;
use crate::core::error::Result;

/// 单次策略调用所用的身份
///
/// 每次调用重新生成，调用之间不共享。
#[derive(Debug, Clone, Default)]
pub struct IdentitySnapshot {
    pub user_agent: String,
    pub proxy: Option<ProxyRef>,
    pub cookies: IndexMap<String, String>,
}

impl IdentitySnapshot {
    /// 渲染为 `Cookie` 请求头，无 Cookie 时返回 `None`
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// 身份提供者
pub struct IdentityProvider {
    agents: Arc<UserAgentRotator>,
    proxies: ProxyPool,
    cookies: CookieStore,
    use_proxies: bool,
}

impl IdentityProvider {
    pub fn new(
        agents: Arc<UserAgentRotator>,
        proxies: ProxyPool,
        cookies: CookieStore,
        use_proxies: bool,
    ) -> Self {
        Self {
            agents,
            proxies,
            cookies,
            use_proxies,
        }
    }

    /// 按配置加载全部身份素材
    pub async fn from_config(cfg: &IdentityConfig) -> Result<Self> {
        let agents = Arc::new(UserAgentRotator::load(cfg.user_agents_file.as_deref()).await);

        let proxies = match (&cfg.proxy_file, cfg.use_proxies) {
            (Some(path), true) => ProxyPool::load(path).await?,
            _ => ProxyPool::default(),
        };

        let cookies = match cfg.cookie_path() {
            Some(path) => CookieStore::load(path).await,
            None => CookieStore::in_memory(),
        };

        info!(
            "身份素材就绪: UA {} 条, 代理 {} 个, Cookie {} 个",
            agents.len(),
            proxies.len(),
            cookies.len()
        );

        Ok(Self::new(agents, proxies, cookies, cfg.use_proxies))
    }

    /// 生成新的身份快照
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            user_agent: self.agents.next(),
            proxy: if self.use_proxies {
                self.proxies.next()
            } else {
                None
            },
            cookies: self.cookies.snapshot(),
        }
    }

    pub fn agents(&self) -> Arc<UserAgentRotator> {
        Arc::clone(&self.agents)
    }

    pub fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }
}
