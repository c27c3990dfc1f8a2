//! 采集管线
//!
//! 站点负责 URL 与解析，编排器负责取回有效页面；两者在此拼接。

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::config::FetchConfig;
use crate::core::error::Result;
use crate::core::model::{ProductDetail, ProductSummary};
use crate::interfaces::RecordExtractor;

use super::orchestrator::FetchOrchestrator;

/// 爬虫引擎
pub struct ScrapeEngine {
    site: Arc<dyn RecordExtractor>,
    orchestrator: Arc<FetchOrchestrator>,
    fetch: FetchConfig,
}

impl ScrapeEngine {
    pub fn new(
        site: Arc<dyn RecordExtractor>,
        orchestrator: Arc<FetchOrchestrator>,
        fetch: FetchConfig,
    ) -> Self {
        Self {
            site,
            orchestrator,
            fetch,
        }
    }

    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.orchestrator
    }

    /// 搜索并解析结果页
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        department: Option<&str>,
    ) -> Result<Vec<ProductSummary>> {
        let url = self.site.search_url(query, page, department)?;
        info!(site = self.site.id(), "搜索 '{}' (第 {} 页)", query, page);

        let html = self.fetch_page(&url).await?;
        Ok(self.site.extract_search(&html))
    }

    /// 抓取并解析单个商品详情
    pub async fn product(&self, id: &str) -> Result<ProductDetail> {
        let url = self.site.detail_url(id);
        info!(site = self.site.id(), "抓取商品 {}", id);

        let html = self.fetch_page(&url).await?;
        Ok(self.site.extract_detail(&html, id))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let result = self
            .orchestrator
            .fetch(url, self.fetch.max_attempts, self.fetch.base_delay())
            .await?;
        debug!(source = %result.source, bytes = result.content.len(), "页面已取回");
        Ok(result.content)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::error::{FetchError, SpiderError, StrategyError};
    use crate::identity::{CookieStore, IdentityProvider, IdentitySnapshot, ProxyPool, UserAgentRotator};
    use crate::interfaces::{AcquisitionStrategy, RawContent, StrategyId};
    use crate::network::classifier::ChallengeClassifier;
    use crate::sites::amazon::Amazon;

    /// 按 URL 返回固定页面
    struct Canned(&'static str);

    #[async_trait]
    impl AcquisitionStrategy for Canned {
        fn id(&self) -> StrategyId {
            StrategyId::Plain
        }

        async fn acquire(
            &self,
            url: &str,
            _identity: &IdentitySnapshot,
            _timeout: Duration,
        ) -> std::result::Result<RawContent, StrategyError> {
            if url.contains("/dp/") || url.contains("/s?") {
                Ok(RawContent::new(self.0))
            } else {
                Err(StrategyError::Status(404))
            }
        }
    }

    fn engine(body: &'static str, max_attempts: u32) -> ScrapeEngine {
        let identity = Arc::new(IdentityProvider::new(
            Arc::new(UserAgentRotator::builtin()),
            ProxyPool::default(),
            CookieStore::in_memory(),
            false,
        ));
        let orchestrator = FetchOrchestrator::new(
            vec![Arc::new(Canned(body)) as Arc<dyn AcquisitionStrategy>],
            Arc::new(ChallengeClassifier::new()),
            identity,
            Duration::from_secs(5),
        )
        .unwrap();
        let fetch = FetchConfig::builder()
            .max_attempts(max_attempts)
            .base_delay_secs(0)
            .request_timeout_secs(5)
            .build();

        ScrapeEngine::new(
            Arc::new(Amazon::new("com").unwrap()),
            Arc::new(orchestrator),
            fetch,
        )
    }

    #[tokio::test]
    async fn search_parses_fetched_page() {
        let page = r#"<html><body>
            <div data-component-type="s-search-result" data-asin="B0MUG00001">
              <h2><a href="/dp/B0MUG00001"><span>Stoneware Mug</span></a></h2>
            </div></body></html>"#;

        let items = engine(page, 1).search("mug", 1, None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].asin, "B0MUG00001");
        assert_eq!(items[0].url.as_deref(), Some("https://www.amazon.com/dp/B0MUG00001"));
    }

    #[tokio::test]
    async fn product_parses_fetched_page() {
        let page = r#"<html><body><span id="productTitle"> Stoneware Mug </span></body></html>"#;

        let detail = engine(page, 1).product("B0MUG00001").await.unwrap();
        assert_eq!(detail.asin, "B0MUG00001");
        assert_eq!(detail.title.as_deref(), Some("Stoneware Mug"));
    }

    #[tokio::test]
    async fn challenge_page_surfaces_as_fetch_error() {
        let page = "<html><body>Enter the characters you see below. Robot Check</body></html>";

        let err = engine(page, 2).product("B0MUG00001").await.unwrap_err();
        assert!(matches!(
            err,
            SpiderError::Fetch(FetchError::ExhaustedRetries { attempts: 2, .. })
        ));
    }
}
