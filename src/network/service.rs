use std::time::Duration;

use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::tls;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::debug;

use crate::core::error::StrategyError;
use crate::identity::{Cookie, IdentitySnapshot, ProxyRef};
use crate::interfaces::RawContent;
use crate::network::middleware::{IdentityMiddleware, RequestIdentity, StatusGuardMiddleware};

/// 客户端构建参数
pub struct ClientOptions<'a> {
    pub headers: &'a HeaderMap,
    pub proxy: Option<&'a ProxyRef>,
    pub timeout: Duration,
    /// 以浏览器的大小写形式发送 HTTP/1 头
    pub title_case_headers: bool,
    /// 最低 TLS 版本
    pub min_tls: Option<tls::Version>,
}

/// 构建带身份注入与状态守卫的 HTTP 客户端
pub fn build_client(opts: ClientOptions<'_>) -> Result<ClientWithMiddleware, StrategyError> {
    let mut builder = reqwest::Client::builder()
        .default_headers(opts.headers.clone())
        .pool_max_idle_per_host(8)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(10))
        .timeout(opts.timeout);

    if opts.title_case_headers {
        builder = builder.http1_title_case_headers();
    }

    if let Some(version) = opts.min_tls {
        builder = builder.min_tls_version(version);
    }

    // 代理只来自身份快照，不读取系统代理环境变量
    builder = match opts.proxy {
        Some(proxy) => {
            // 无法解析的代理与不可达同等处理，交由编排器剔除
            let p = reqwest::Proxy::all(proxy.as_str())
                .map_err(|_| StrategyError::ProxyUnreachable(proxy.clone()))?;
            builder.proxy(p)
        }
        None => builder.no_proxy(),
    };

    let client = builder.build().map_err(StrategyError::Http)?;

    Ok(ClientBuilder::new(client)
        .with(IdentityMiddleware)
        .with(StatusGuardMiddleware)
        .build())
}

/// 以给定身份发起 GET，收集正文与 `Set-Cookie`
pub async fn fetch_page(
    client: &ClientWithMiddleware,
    url: &str,
    user_agent: &str,
    identity: &IdentitySnapshot,
) -> Result<RawContent, StrategyError> {
    let proxy = identity.proxy.as_ref();
    let resp = client
        .get(url)
        .with_extension(RequestIdentity {
            user_agent: user_agent.to_string(),
            cookie: identity.cookie_header(),
        })
        .send()
        .await
        .map_err(|e| StrategyError::from_middleware(e, proxy))?;

    let host = resp.url().host_str().unwrap_or_default().to_string();
    let cookies = parse_set_cookies(resp.headers(), &host);

    let body = resp
        .text()
        .await
        .map_err(|e| StrategyError::from_reqwest(e, proxy))?;

    debug!(
        "已获取 {} ({} bytes, {} cookies)",
        url,
        body.len(),
        cookies.len()
    );
    Ok(RawContent::new(body).with_cookies(cookies))
}

fn parse_set_cookies(headers: &HeaderMap, host: &str) -> Vec<Cookie> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| Cookie::parse_set_cookie(raw, host))
        .collect()
}
