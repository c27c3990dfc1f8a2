//! 浏览器驱动策略
//!
//! 以完整 Chromium 会话取页。UA 与代理在会话级生效；代理变化或技术性失败后重新启动会话。

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{
    Page,
    browser::{Browser, BrowserConfig as ChromiumConfig},
    cdp::browser_protocol::network::{
        Cookie as CdpCookie, CookieParam, Headers, SetExtraHttpHeadersParams,
        SetUserAgentOverrideParams,
    },
    cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams,
};
use futures::StreamExt;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::core::config::BrowserConfig;
use crate::core::error::{Result, SpiderError, StrategyError};
use crate::identity::{Cookie, IdentitySnapshot, ProxyRef};
use crate::interfaces::{AcquisitionStrategy, RawContent, StrategyId};
use crate::network::classifier::ChallengeClassifier;
use crate::network::headers;

static STEALTH_JS: &str = include_str!("../../stealth.js");

/// 关闭页面或会话的等待上限
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// 页面守卫：未经 `close` 释放时在 Drop 中异步关闭标签页
struct PageGuard {
    page: Page,
    closed: bool,
}

impl PageGuard {
    fn new(page: Page) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    async fn close(mut self) {
        self.closed = true;
        match tokio::time::timeout(CLOSE_TIMEOUT, self.page.clone().close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("关闭页面失败: {}", e),
            Err(_) => debug!("关闭页面超时"),
        }
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if !self.closed
            && let Ok(rt) = tokio::runtime::Handle::try_current()
        {
            let page = self.page.clone();
            rt.spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

/// 浏览器会话
/// 采用显式的所有权管理，确保关闭逻辑的确定性
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    user_agent: String,
    proxy: Option<ProxyRef>,
}

impl BrowserSession {
    /// 启动浏览器会话
    pub async fn launch(
        config: &BrowserConfig,
        user_agent: &str,
        proxy: Option<&ProxyRef>,
    ) -> Result<Self> {
        let browser_config = build_browser_config(config, user_agent, proxy)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SpiderError::Browser(e.to_string()))?;

        // 启动事件循环
        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("浏览器会话已启动 (proxy: {:?})", proxy.map(ProxyRef::as_str));
        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
            user_agent: user_agent.to_string(),
            proxy: proxy.cloned(),
        })
    }

    /// 创建新页面，注入隐身脚本并应用会话 UA 与附加请求头
    async fn new_page(&self) -> Result<PageGuard> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| SpiderError::Browser("Browser already closed".into()))?;
        let page = PageGuard::new(
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| SpiderError::Browser(e.to_string()))?,
        );

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                STEALTH_JS.to_string(),
            ))
            .await
        {
            debug!("Stealth injection warning: {}", e);
        }

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(self.user_agent.clone())
            .accept_language("en-US,en;q=0.9")
            .build()
            .map_err(SpiderError::Browser)?;
        page.set_user_agent(ua)
            .await
            .map_err(|e| SpiderError::Browser(e.to_string()))?;

        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            headers::browser_extra(),
        )))
        .await
        .map_err(|e| SpiderError::Browser(e.to_string()))?;

        Ok(page)
    }

    fn serves(&self, proxy: Option<&ProxyRef>) -> bool {
        self.browser.is_some() && self.proxy.as_ref() == proxy
    }

    /// 优雅关闭浏览器，并等待事件循环结束
    pub async fn close(&mut self) {
        let browser = self.browser.take();
        let handler = self.handler.take();

        if let Some(mut b) = browser {
            if let Err(e) = b.close().await {
                debug!("关闭浏览器时发生非致命错误: {}", e);
            }
            if let Some(h) = handler {
                let _ = h.await;
            }
        }
    }
}

// 在 Drop 时尝试最后一次保护
impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            let handler = self.handler.take();
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                rt.spawn(async move {
                    let _ = browser.close().await;
                    if let Some(h) = handler {
                        let _ = h.await;
                    }
                });
            }
        }
    }
}

/// 构建 Chromium 启动配置
fn build_browser_config(
    config: &BrowserConfig,
    user_agent: &str,
    proxy: Option<&ProxyRef>,
) -> Result<ChromiumConfig> {
    let mut builder = ChromiumConfig::builder()
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", user_agent))
        .arg("--disable-infobars")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-notifications")
        .arg("--disable-popup-blocking")
        .arg("--window-size=1920,1080")
        .arg("--disable-extensions");

    if let Some(proxy) = proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    if config.headless {
        builder = builder.arg("--headless=new");
    } else {
        builder = builder.with_head();
    }

    let chrome_path = config.chrome_path.clone().or_else(|| {
        [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
    });

    if let Some(path) = chrome_path {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(SpiderError::Browser)
}

fn from_cdp_cookie(c: CdpCookie) -> Cookie {
    Cookie {
        name: c.name,
        value: c.value,
        domain: c.domain,
        path: c.path,
        secure: c.secure,
        http_only: c.http_only,
        expires: cookie_expiry(c.session, c.expires),
    }
}

/// CDP 以 -1 表示会话 Cookie
fn cookie_expiry(session: bool, expires: f64) -> Option<u64> {
    (!session && expires > 0.0).then_some(expires as u64)
}

/// 浏览器策略
pub struct BrowserStrategy {
    config: BrowserConfig,
    classifier: Arc<ChallengeClassifier>,
    session: Mutex<Option<BrowserSession>>,
}

impl BrowserStrategy {
    /// 构造时校验启动配置，找不到可执行文件等问题在此处立即暴露
    pub fn new(config: BrowserConfig, classifier: Arc<ChallengeClassifier>) -> Result<Self> {
        if config.enabled {
            build_browser_config(&config, "validate", None).map_err(|e| {
                SpiderError::Setup(format!("浏览器不可用 ({}), 可使用 --no-browser 禁用", e))
            })?;
        }
        Ok(Self {
            config,
            classifier,
            session: Mutex::new(None),
        })
    }

    /// 按需启动会话后取页；页面在任何出口都会被关闭
    async fn run(
        &self,
        slot: &mut Option<BrowserSession>,
        url: &str,
        identity: &IdentitySnapshot,
    ) -> Result<RawContent> {
        if !slot.as_ref().is_some_and(|s| s.serves(identity.proxy.as_ref())) {
            if let Some(mut old) = slot.take() {
                old.close().await;
            }
            *slot = Some(
                BrowserSession::launch(&self.config, &identity.user_agent, identity.proxy.as_ref())
                    .await?,
            );
        }

        let session = slot
            .as_ref()
            .ok_or_else(|| SpiderError::Browser("browser session unavailable".into()))?;

        let page = session.new_page().await?;
        let result = self.load(&page, url, identity).await;
        page.close().await;
        result
    }

    /// 在已准备好的页面上导航并读取内容
    async fn load(&self, page: &Page, url: &str, identity: &IdentitySnapshot) -> Result<RawContent> {
        let params: Vec<CookieParam> = identity
            .cookies
            .iter()
            .filter_map(|(name, value)| {
                CookieParam::builder()
                    .name(name.clone())
                    .value(value.clone())
                    .url(url.to_string())
                    .build()
                    .ok()
            })
            .collect();
        if !params.is_empty()
            && let Err(e) = page.set_cookies(params).await
        {
            debug!("写入浏览器 Cookie 失败: {}", e);
        }

        page.goto(url)
            .await
            .map_err(|e| SpiderError::Browser(e.to_string()))?;

        let settle = self.config.settle_time();
        tokio::time::sleep(settle).await;

        let mut html = page
            .content()
            .await
            .map_err(|e| SpiderError::Browser(e.to_string()))?;

        // 给定时挑战一次自动放行的机会，最终判定仍由编排器完成
        if !self.classifier.classify(&html).is_valid() {
            warn!("疑似挑战页，追加等待 {:?}", settle * self.config.challenge_wait_factor);
            tokio::time::sleep(settle * self.config.challenge_wait_factor).await;
            html = page
                .content()
                .await
                .map_err(|e| SpiderError::Browser(e.to_string()))?;
        }

        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| SpiderError::Browser(e.to_string()))?
            .into_iter()
            .map(from_cdp_cookie)
            .collect();

        Ok(RawContent::new(html).with_cookies(cookies))
    }
}

#[async_trait]
impl AcquisitionStrategy for BrowserStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Browser
    }

    fn can_handle(&self) -> bool {
        self.config.enabled
    }

    fn extra_budget(&self) -> Duration {
        self.config.settle_time() * (1 + self.config.challenge_wait_factor)
    }

    async fn acquire(
        &self,
        url: &str,
        identity: &IdentitySnapshot,
        timeout: Duration,
    ) -> std::result::Result<RawContent, StrategyError> {
        // 启动、建页与导航共用同一截止时间
        let budget = timeout + self.extra_budget();
        let deadline = tokio::time::Instant::now() + budget;

        let Ok(mut slot) = tokio::time::timeout_at(deadline, self.session.lock()).await else {
            return Err(StrategyError::Timeout(budget));
        };

        let outcome = match tokio::time::timeout_at(deadline, self.run(&mut slot, url, identity)).await {
            Ok(Ok(raw)) => return Ok(raw),
            Ok(Err(e)) => classify_browser_error(e, identity.proxy.as_ref()),
            Err(_) => StrategyError::Timeout(budget),
        };

        warn!("浏览器取页失败，重启会话: {}", outcome);
        if let Some(mut session) = slot.take()
            && tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await.is_err()
        {
            debug!("关闭浏览器超时，转入后台清理");
        }
        Err(outcome)
    }

    async fn shutdown(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            session.close().await;
            info!("浏览器会话已关闭");
        }
    }
}

/// 导航阶段的代理错误归咎于代理本身
fn classify_browser_error(err: SpiderError, proxy: Option<&ProxyRef>) -> StrategyError {
    let msg = err.to_string();
    match proxy {
        Some(p)
            if msg.contains("ERR_PROXY_CONNECTION_FAILED")
                || msg.contains("ERR_TUNNEL_CONNECTION_FAILED") =>
        {
            StrategyError::ProxyUnreachable(p.clone())
        }
        _ => StrategyError::Browser(msg),
    }
}
