//! 指纹模拟 HTTP 策略
//!
//! 持有私有会话客户端；任何技术性失败后都以新 UA 重建会话再上报，
//! 保证下一次尝试从干净会话开始。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::tls;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, warn};

use crate::core::error::StrategyError;
use crate::identity::{IdentitySnapshot, ProxyRef, UserAgentRotator};
use crate::interfaces::{AcquisitionStrategy, RawContent, StrategyId};
use crate::network::headers;
use crate::network::service::{ClientOptions, build_client, fetch_page};

/// 模拟的指纹类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintProfile {
    /// 通用浏览器指纹（Chrome 头集合 + Client Hints）
    GenericBrowser,
    /// Chrome 96 握手签名
    Chrome96Tls,
}

impl FingerprintProfile {
    fn id(self) -> StrategyId {
        match self {
            FingerprintProfile::GenericBrowser => StrategyId::Cloaked,
            FingerprintProfile::Chrome96Tls => StrategyId::TlsProfile,
        }
    }

    fn headers(self) -> &'static HeaderMap {
        match self {
            FingerprintProfile::GenericBrowser => headers::chrome(),
            FingerprintProfile::Chrome96Tls => headers::chrome96(),
        }
    }

    /// 握手下限；Chrome 96 不再协商 TLS 1.0/1.1
    fn min_tls(self) -> Option<tls::Version> {
        match self {
            FingerprintProfile::GenericBrowser => None,
            FingerprintProfile::Chrome96Tls => Some(tls::Version::TLS_1_2),
        }
    }
}

struct Session {
    client: ClientWithMiddleware,
    user_agent: String,
    proxy: Option<ProxyRef>,
}

pub struct FingerprintStrategy {
    profile: FingerprintProfile,
    agents: Arc<UserAgentRotator>,
    timeout: Duration,
    session: Mutex<Option<Session>>,
}

impl FingerprintStrategy {
    pub fn new(profile: FingerprintProfile, agents: Arc<UserAgentRotator>, timeout: Duration) -> Self {
        Self {
            profile,
            agents,
            timeout,
            session: Mutex::new(None),
        }
    }

    fn open(&self, user_agent: String, proxy: Option<ProxyRef>) -> Result<Session, StrategyError> {
        let client = build_client(ClientOptions {
            headers: self.profile.headers(),
            proxy: proxy.as_ref(),
            timeout: self.timeout,
            title_case_headers: true,
            min_tls: self.profile.min_tls(),
        })?;
        debug!("[{}] 会话已建立 (proxy: {:?})", self.id(), proxy);
        Ok(Session {
            client,
            user_agent,
            proxy,
        })
    }

    /// 取当前会话；代理变化时重建，UA 保持会话内一致
    fn checkout(&self, identity: &IdentitySnapshot) -> Result<(ClientWithMiddleware, String), StrategyError> {
        let mut slot = self.session.lock();
        let stale = slot
            .as_ref()
            .is_none_or(|s| s.proxy != identity.proxy);

        if stale {
            let user_agent = slot
                .as_ref()
                .map(|s| s.user_agent.clone())
                .unwrap_or_else(|| identity.user_agent.clone());
            *slot = Some(self.open(user_agent, identity.proxy.clone())?);
        }

        let session = slot
            .as_ref()
            .ok_or_else(|| StrategyError::Middleware("session unavailable".into()))?;
        Ok((session.client.clone(), session.user_agent.clone()))
    }

    /// 以新 UA 重建会话
    fn reinit(&self, proxy: Option<ProxyRef>) {
        let user_agent = self.agents.next();
        let mut slot = self.session.lock();
        match self.open(user_agent, proxy) {
            Ok(session) => *slot = Some(session),
            Err(e) => {
                warn!("[{}] 会话重建失败: {}", self.id(), e);
                *slot = None;
            }
        }
    }

    #[cfg(test)]
    fn session_agent(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.user_agent.clone())
    }
}

#[async_trait]
impl AcquisitionStrategy for FingerprintStrategy {
    fn id(&self) -> StrategyId {
        self.profile.id()
    }

    async fn acquire(
        &self,
        url: &str,
        identity: &IdentitySnapshot,
        timeout: Duration,
    ) -> Result<RawContent, StrategyError> {
        let result = match self.checkout(identity) {
            Ok((client, user_agent)) => {
                match tokio::time::timeout(timeout, fetch_page(&client, url, &user_agent, identity)).await {
                    Ok(r) => r,
                    Err(_) => Err(StrategyError::Timeout(timeout)),
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("[{}] 请求失败，以新 UA 重建会话: {}", self.id(), e);
            self.reinit(identity.proxy.clone());
        }
        result
    }

    async fn shutdown(&self) {
        self.session.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FetchError;
    use crate::engine::FetchOrchestrator;
    use crate::identity::{CookieStore, IdentityProvider, ProxyPool};
    use crate::network::classifier::ChallengeClassifier;
    use crate::network::testing::black_hole;

    fn strategy(profile: FingerprintProfile) -> FingerprintStrategy {
        FingerprintStrategy::new(
            profile,
            Arc::new(UserAgentRotator::with_pool(vec!["Fresh/2.0".into()])),
            Duration::from_secs(5),
        )
    }

    fn snapshot(proxy: Option<&str>) -> IdentitySnapshot {
        IdentitySnapshot {
            user_agent: "Snapshot/1.0".into(),
            proxy: proxy.map(ProxyRef::new),
            ..Default::default()
        }
    }

    #[test]
    fn profiles_map_to_distinct_ids() {
        assert_eq!(strategy(FingerprintProfile::GenericBrowser).id(), StrategyId::Cloaked);
        assert_eq!(strategy(FingerprintProfile::Chrome96Tls).id(), StrategyId::TlsProfile);
    }

    #[test]
    fn profiles_differ_on_the_wire() {
        let generic = FingerprintProfile::GenericBrowser;
        let chrome96 = FingerprintProfile::Chrome96Tls;
        assert_eq!(generic.min_tls(), None);
        assert_eq!(chrome96.min_tls(), Some(tls::Version::TLS_1_2));
        assert!(generic.headers().contains_key("sec-ch-ua"));
        assert!(!chrome96.headers().contains_key("sec-ch-ua"));
        assert_eq!(chrome96.headers()["dnt"], "1");

        let s = strategy(chrome96);
        s.checkout(&snapshot(None)).unwrap();
        assert_eq!(s.session_agent().as_deref(), Some("Snapshot/1.0"));
    }

    #[test]
    fn session_keeps_its_agent_across_proxy_changes() {
        let s = strategy(FingerprintProfile::GenericBrowser);
        s.checkout(&snapshot(None)).unwrap();
        assert_eq!(s.session_agent().as_deref(), Some("Snapshot/1.0"));

        let mut next = snapshot(Some("http://127.0.0.1:8080"));
        next.user_agent = "Other/1.0".into();
        let (_, ua) = s.checkout(&next).unwrap();
        assert_eq!(ua, "Snapshot/1.0");
    }

    #[tokio::test]
    async fn failure_reinitialises_with_new_agent() {
        let s = strategy(FingerprintProfile::Chrome96Tls);
        let err = s
            .acquire(
                "https://www.amazon.com/",
                &snapshot(Some("http://bad host:99999")),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::ProxyUnreachable(_)));
        // 重建同样失败时会话被清空
        assert_eq!(s.session_agent(), None);

        s.checkout(&snapshot(None)).unwrap();
        let err = s
            .acquire("not a url", &snapshot(None), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(!matches!(err, StrategyError::ProxyUnreachable(_)));
        assert_eq!(s.session_agent().as_deref(), Some("Fresh/2.0"));
    }

    #[tokio::test]
    async fn stalled_server_still_rotates_agent_under_orchestrator() {
        let url = black_hole().await;

        let identity = Arc::new(IdentityProvider::new(
            Arc::new(UserAgentRotator::with_pool(vec!["Snapshot/1.0".into()])),
            ProxyPool::default(),
            CookieStore::in_memory(),
            false,
        ));
        let s = Arc::new(FingerprintStrategy::new(
            FingerprintProfile::GenericBrowser,
            Arc::new(UserAgentRotator::with_pool(vec!["Fresh/2.0".into()])),
            Duration::from_secs(30),
        ));
        let orch = FetchOrchestrator::new(
            vec![s.clone() as Arc<dyn AcquisitionStrategy>],
            Arc::new(ChallengeClassifier::new()),
            identity,
            Duration::from_secs(1),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = orch.fetch(&url, 1, Duration::ZERO).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));

        match err {
            FetchError::ExhaustedRetries { last_reason, .. } => {
                assert!(last_reason.contains("timed out"), "{}", last_reason)
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(s.session_agent().as_deref(), Some("Fresh/2.0"));
    }
}
