use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::StrategyError;
use crate::identity::IdentitySnapshot;
use crate::interfaces::{AcquisitionStrategy, RawContent, StrategyId};
use crate::network::headers;
use crate::network::service::{ClientOptions, build_client, fetch_page};

/// 普通 HTTP 策略
///
/// 兜底手段：每次调用新建客户端，附带完整 Cookie 快照与浏览器式请求头。
#[derive(Debug, Default)]
pub struct PlainStrategy;

impl PlainStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AcquisitionStrategy for PlainStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Plain
    }

    async fn acquire(
        &self,
        url: &str,
        identity: &IdentitySnapshot,
        timeout: Duration,
    ) -> Result<RawContent, StrategyError> {
        let client = build_client(ClientOptions {
            headers: headers::plain(),
            proxy: identity.proxy.as_ref(),
            timeout,
            title_case_headers: false,
            min_tls: None,
        })?;

        fetch_page(&client, url, &identity.user_agent, identity).await
    }
}
