use reqwest::header::{COOKIE, HeaderValue, USER_AGENT};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::debug;

use crate::core::error::StrategyError;

/// 单次请求的身份
///
/// 作为请求扩展 (Extension) 随请求传递，由 `IdentityMiddleware` 注入 Header。
#[derive(Debug, Clone, Default)]
pub struct RequestIdentity {
    pub user_agent: String,
    pub cookie: Option<String>,
}

/// 身份注入中间件
/// 负责在每次请求前，将本次调用的 UA/Cookie 写入 Header
pub struct IdentityMiddleware;

#[async_trait::async_trait]
impl Middleware for IdentityMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(identity) = extensions.get::<RequestIdentity>() {
            let headers = req.headers_mut();

            if !identity.user_agent.is_empty()
                && let Ok(val) = HeaderValue::from_str(&identity.user_agent)
            {
                headers.insert(USER_AGENT, val);
            }

            if let Some(cookie) = &identity.cookie
                && !cookie.is_empty()
                && let Ok(val) = HeaderValue::from_str(cookie)
            {
                headers.insert(COOKIE, val);
            }
        }
        next.run(req, extensions).await
    }
}

/// 状态码守卫
/// 非 2xx 一律视为技术性失败，内容判定留给分类器
pub struct StatusGuardMiddleware;

#[async_trait::async_trait]
impl Middleware for StatusGuardMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let resp = next.run(req, extensions).await?;
        let status = resp.status();
        if !status.is_success() {
            debug!("响应状态异常: {} ({})", status, resp.url());
            return Err(reqwest_middleware::Error::from(anyhow::Error::new(
                StrategyError::Status(status.as_u16()),
            )));
        }
        Ok(resp)
    }
}
