//! 抗封锁采集编排器 (Resilient Fetch Orchestrator)
//!
//! 每轮以随机顺序依次尝试全部可用策略；技术性失败与挑战页都只是软失败，
//! 本轮无有效内容时线性退避后进入下一轮。唯一的成功出口是分类器判定为 VALID 的内容。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::{FetchError, Result, SpiderError, StrategyError};
use crate::core::event::{EventSender, FetchEvent};
use crate::engine::retry::RetryState;
use crate::identity::{Cookie, IdentityProvider};
use crate::interfaces::{AcquisitionStrategy, RawContent, StrategyId};
use crate::network::classifier::{ChallengeClassifier, ChallengeReason, Verdict};

/// 外层时限在策略自身超时之外的余量，留给策略完成失败后的会话重建与清理
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// 经分类器确认的有效内容
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub content: String,
    pub source: StrategyId,
}

/// 单次策略调用的结果
enum AttemptOutcome {
    TechnicalFailure(StrategyError),
    Challenge {
        reason: ChallengeReason,
        cookies: Vec<Cookie>,
    },
    Valid(RawContent),
}

pub struct FetchOrchestrator {
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    classifier: Arc<ChallengeClassifier>,
    identity: Arc<IdentityProvider>,
    request_timeout: Duration,
    events: Option<EventSender>,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl FetchOrchestrator {
    /// 构造编排器；前置条件不满足的策略在此处剔除
    pub fn new(
        strategies: Vec<Arc<dyn AcquisitionStrategy>>,
        classifier: Arc<ChallengeClassifier>,
        identity: Arc<IdentityProvider>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let (usable, skipped): (Vec<_>, Vec<_>) =
            strategies.into_iter().partition(|s| s.can_handle());

        for s in &skipped {
            debug!("策略 {} 前置条件不满足，已排除", s.id());
        }
        if usable.is_empty() {
            return Err(SpiderError::Setup("没有可用的采集策略".into()));
        }

        info!(
            "编排器就绪，可用策略: {}",
            usable
                .iter()
                .map(|s| s.id().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            strategies: usable,
            classifier,
            identity,
            request_timeout,
            events: None,
            cancel: CancellationToken::new(),
            shut_down: AtomicBool::new(false),
        })
    }

    /// 设置事件发送器
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// 使用外部取消令牌
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    fn emit(&self, event: FetchEvent) {
        if let Some(ref sender) = self.events {
            sender.emit(event);
        }
    }

    /// 取回 `url` 的有效内容
    pub async fn fetch(
        &self,
        url: &str,
        max_attempts: u32,
        base_delay: Duration,
    ) -> std::result::Result<FetchResult, FetchError> {
        let cancel = self.cancel.clone();
        self.fetch_with_cancel(url, max_attempts, base_delay, &cancel)
            .await
    }

    /// 同 [`fetch`](Self::fetch)，但响应调用方提供的取消令牌
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        max_attempts: u32,
        base_delay: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchResult, FetchError> {
        let mut state = RetryState::new(max_attempts, base_delay);

        while let Some(attempt) = state.begin_attempt() {
            if cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            info!(url, attempt, max = state.max_attempts(), "开始第 {} 轮尝试", attempt);
            self.emit(FetchEvent::AttemptStarted {
                url: url.to_string(),
                attempt,
                max_attempts: state.max_attempts(),
            });

            let mut order = self.strategies.clone();
            order.shuffle(&mut rand::rng());

            for strategy in &order {
                let id = strategy.id();
                state.record_tried(id);

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.cancelled()),
                    outcome = self.invoke(strategy.as_ref(), url) => outcome,
                };

                match outcome {
                    AttemptOutcome::Valid(raw) => {
                        return Ok(self.accept(id, raw).await);
                    }
                    AttemptOutcome::Challenge { reason, cookies } => {
                        warn!(strategy = %id, attempt, "检测到挑战页: {}", reason);
                        // 挑战页也可能下发后续需要的会话 Cookie
                        self.identity.cookies().merge(cookies);
                        self.emit(FetchEvent::ChallengeDetected {
                            strategy: id,
                            reason: reason.to_string(),
                        });
                        state.record_failure(id, format!("challenge: {}", reason));
                    }
                    AttemptOutcome::TechnicalFailure(err) => {
                        warn!(strategy = %id, attempt, "策略失败: {}", err);
                        if let Some(proxy) = err.bad_proxy() {
                            self.drop_proxy(proxy);
                        }
                        self.emit(FetchEvent::StrategyFailed {
                            strategy: id,
                            error: err.to_string(),
                        });
                        state.record_failure(id, err);
                    }
                }
            }

            if let Some(delay) = state.backoff() {
                warn!(
                    "第 {}/{} 轮全部失败 ({} 个策略)，{:?} 后重试",
                    attempt,
                    state.max_attempts(),
                    state.tried_this_attempt(),
                    delay
                );
                self.emit(FetchEvent::BackingOff {
                    attempt,
                    delay_secs: delay.as_secs(),
                });

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let attempts = state.attempt();
        let last_reason = state.last_reason();
        warn!("{} 在 {} 轮后仍未取得有效内容: {}", url, attempts, last_reason);
        self.emit(FetchEvent::Exhausted { attempts });
        Err(FetchError::ExhaustedRetries {
            attempts,
            last_reason,
        })
    }

    /// 以新身份快照调用一次策略并分类结果
    async fn invoke(&self, strategy: &dyn AcquisitionStrategy, url: &str) -> AttemptOutcome {
        let identity = self.identity.snapshot();
        let budget = self.request_timeout + strategy.extra_budget() + TIMEOUT_GRACE;

        let raw = match tokio::time::timeout(
            budget,
            strategy.acquire(url, &identity, self.request_timeout),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return AttemptOutcome::TechnicalFailure(e),
            Err(_) => return AttemptOutcome::TechnicalFailure(StrategyError::Timeout(budget)),
        };

        match self.classifier.classify(&raw.body) {
            Verdict::Valid => AttemptOutcome::Valid(raw),
            Verdict::Challenge(reason) => AttemptOutcome::Challenge {
                reason,
                cookies: raw.cookies,
            },
        }
    }

    async fn accept(&self, id: StrategyId, raw: RawContent) -> FetchResult {
        let cookies = self.identity.cookies();
        cookies.merge(raw.cookies);
        if let Err(e) = cookies.persist().await {
            warn!("Cookie 持久化失败: {}", e);
        }

        info!(strategy = %id, bytes = raw.body.len(), "已取得有效内容");
        self.emit(FetchEvent::Succeeded {
            strategy: id,
            bytes: raw.body.len(),
        });

        FetchResult {
            content: raw.body,
            source: id,
        }
    }

    fn drop_proxy(&self, proxy: &crate::identity::ProxyRef) {
        let pool = self.identity.proxies();
        if pool.mark_bad(proxy) {
            self.emit(FetchEvent::ProxyDropped {
                proxy: proxy.to_string(),
                remaining: pool.len(),
            });
        }
    }

    fn cancelled(&self) -> FetchError {
        info!("采集已取消");
        self.emit(FetchEvent::Cancelled);
        FetchError::Cancelled
    }

    /// 释放全部策略资源并保存 Cookie；重复调用无效果
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        for strategy in &self.strategies {
            strategy.shutdown().await;
        }
        if let Err(e) = self.identity.cookies().persist().await {
            warn!("Cookie 持久化失败: {}", e);
        }
        debug!("编排器已关闭");
    }
}
