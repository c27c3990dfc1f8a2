use std::time::Duration;

use async_trait::async_trait;
use strum::{Display, EnumString};

use crate::core::error::StrategyError;
use crate::identity::{Cookie, IdentitySnapshot};

/// 采集技术标识
///
/// 仅用于日志与事件，下游不据此分支。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StrategyId {
    /// 完整浏览器驱动
    Browser,
    /// 通用浏览器指纹模拟
    Cloaked,
    /// 特定 TLS 握手签名模拟
    TlsProfile,
    /// 带浏览器头的普通 HTTP 客户端
    Plain,
}

/// 一次采集的原始产出
#[derive(Debug, Clone, Default)]
pub struct RawContent {
    pub body: String,
    /// 响应中观察到的 Cookie 增量
    pub cookies: Vec<Cookie>,
}

impl RawContent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }
}

/// 采集策略接口
///
/// - 策略负责：按身份快照取回原始内容，报告传输层失败与 Cookie 增量。
/// - 策略不负责：判定内容是否为挑战页（由分类器完成），也不修改全局身份状态。
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// 前置能力是否满足，编排器构造时据此过滤
    fn can_handle(&self) -> bool {
        true
    }

    /// 策略内部固定等待所需的额外时长，编排器将其计入单次调用的时限
    fn extra_budget(&self) -> Duration {
        Duration::ZERO
    }

    /// 在给定超时内取回 `url` 的原始内容
    async fn acquire(
        &self,
        url: &str,
        identity: &IdentitySnapshot,
        timeout: Duration,
    ) -> Result<RawContent, StrategyError>;

    /// 释放长生命周期资源（浏览器进程、HTTP 会话）
    async fn shutdown(&self) {}
}
