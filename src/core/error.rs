//! 错误处理体系 (Error Handling System)
//!
//! 分层定义错误类型：单次采集策略的技术性失败、编排器的终态失败，以及应用层错误与全局 Result 别名。

use std::time::Duration;

use thiserror::Error;

use crate::identity::ProxyRef;

/// 采集策略错误 (Technical Failure)
///
/// 只描述传输层问题。内容是否为挑战页由分类器判定，不在此处表达。
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(String),

    #[error("Unexpected status: HTTP {0}")]
    Status(u16),

    #[error("Proxy unreachable: {0}")]
    ProxyUnreachable(ProxyRef),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl StrategyError {
    /// 解包中间件错误
    ///
    /// 中间件内部抛出的 `StrategyError` 以 anyhow 包装传递，这里逐层还原 (Downcasting)。
    /// 经由代理的连接失败归类为 `ProxyUnreachable`，以便编排器将该代理移出轮换。
    pub fn from_middleware(err: reqwest_middleware::Error, proxy: Option<&ProxyRef>) -> Self {
        match err {
            reqwest_middleware::Error::Middleware(inner) => match inner.downcast::<StrategyError>() {
                Ok(e) => e,
                Err(other) => StrategyError::Middleware(other.to_string()),
            },
            reqwest_middleware::Error::Reqwest(e) => Self::from_reqwest(e, proxy),
        }
    }

    /// 归类底层 reqwest 错误
    pub fn from_reqwest(err: reqwest::Error, proxy: Option<&ProxyRef>) -> Self {
        match proxy {
            Some(p) if err.is_connect() => StrategyError::ProxyUnreachable(p.clone()),
            _ => StrategyError::Http(err),
        }
    }

    /// 失败是否归咎于代理本身
    pub fn bad_proxy(&self) -> Option<&ProxyRef> {
        match self {
            StrategyError::ProxyUnreachable(p) => Some(p),
            _ => None,
        }
    }
}

/// 编排器终态错误 (Terminal Fetch Outcomes)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 所有尝试均未取得有效内容
    #[error("Exhausted {attempts} attempts, last failure: {last_reason}")]
    ExhaustedRetries { attempts: u32, last_reason: String },

    /// 调用方主动取消
    #[error("Fetch cancelled")]
    Cancelled,
}

/// 全局错误定义 (Application Errors)
#[derive(Error, Debug)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// 构造期的致命配置失败（如无可用策略、浏览器无法初始化）
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {0}")]
    Parse(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, SpiderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middleware_error_roundtrips_strategy_error() {
        let wrapped = reqwest_middleware::Error::Middleware(anyhow::Error::new(
            StrategyError::Status(503),
        ));
        let err = StrategyError::from_middleware(wrapped, None);
        assert!(matches!(err, StrategyError::Status(503)));
    }

    #[test]
    fn foreign_middleware_error_is_stringified() {
        let wrapped = reqwest_middleware::Error::Middleware(anyhow::anyhow!("boom"));
        let err = StrategyError::from_middleware(wrapped, None);
        assert!(matches!(err, StrategyError::Middleware(ref m) if m == "boom"));
    }

    #[test]
    fn only_proxy_failures_blame_the_proxy() {
        let proxy = ProxyRef::new("http://10.0.0.1:8080");
        let err = StrategyError::ProxyUnreachable(proxy.clone());
        assert_eq!(err.bad_proxy(), Some(&proxy));
        assert_eq!(StrategyError::Status(403).bad_proxy(), None);
    }

    #[test]
    fn exhausted_display_carries_reason() {
        let err = FetchError::ExhaustedRetries {
            attempts: 3,
            last_reason: "challenge: captcha".into(),
        };
        assert_eq!(
            err.to_string(),
            "Exhausted 3 attempts, last failure: challenge: captcha"
        );
    }
}
