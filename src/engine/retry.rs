//! 单次 fetch 的重试状态
//!
//! 线性退避：第 `a` 轮失败后等待 `base * a`。随 `fetch` 返回一起丢弃。

use std::collections::HashSet;
use std::time::Duration;

use crate::interfaces::StrategyId;

/// 第 `attempt` 轮失败后的等待时长
pub fn linear_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

#[derive(Debug)]
pub struct RetryState {
    max_attempts: u32,
    attempt: u32,
    base_delay: Duration,
    current_delay: Duration,
    tried: HashSet<StrategyId>,
    last_reason: Option<String>,
}

impl RetryState {
    /// `max_attempts` 至少为 1
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempt: 0,
            base_delay,
            current_delay: base_delay,
            tried: HashSet::new(),
            last_reason: None,
        }
    }

    /// 开始下一轮，返回轮次编号（从 1 开始）；已耗尽时返回 `None`
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempts_remaining() == 0 {
            return None;
        }
        self.attempt += 1;
        self.tried.clear();
        self.current_delay = linear_delay(self.base_delay, self.attempt);
        Some(self.attempt)
    }

    pub fn record_tried(&mut self, id: StrategyId) {
        self.tried.insert(id);
    }

    pub fn record_failure(&mut self, id: StrategyId, reason: impl std::fmt::Display) {
        self.last_reason = Some(format!("{}: {}", id, reason));
    }

    /// 本轮结束后的退避时长；最后一轮之后不再等待
    pub fn backoff(&self) -> Option<Duration> {
        (self.attempts_remaining() > 0).then_some(self.current_delay)
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts - self.attempt
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn tried_this_attempt(&self) -> usize {
        self.tried.len()
    }

    pub fn last_reason(&self) -> String {
        self.last_reason
            .clone()
            .unwrap_or_else(|| "no strategy produced content".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_delay_is_monotonic() {
        let base = Duration::from_secs(5);
        let delays: Vec<_> = (1..=10).map(|a| linear_delay(base, a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[0], Duration::from_secs(5));
        assert_eq!(delays[2], Duration::from_secs(15));
    }

    #[test]
    fn no_backoff_after_final_attempt() {
        let mut state = RetryState::new(2, Duration::from_secs(1));
        assert_eq!(state.begin_attempt(), Some(1));
        assert_eq!(state.backoff(), Some(Duration::from_secs(1)));
        assert_eq!(state.begin_attempt(), Some(2));
        assert_eq!(state.backoff(), None);
        assert_eq!(state.begin_attempt(), None);
    }

    #[test]
    fn tried_set_resets_per_attempt() {
        let mut state = RetryState::new(3, Duration::ZERO);
        state.begin_attempt();
        state.record_tried(StrategyId::Plain);
        state.record_tried(StrategyId::Cloaked);
        assert_eq!(state.tried_this_attempt(), 2);
        state.begin_attempt();
        assert_eq!(state.tried_this_attempt(), 0);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let mut state = RetryState::new(0, Duration::ZERO);
        assert_eq!(state.max_attempts(), 1);
        assert_eq!(state.begin_attempt(), Some(1));
        assert_eq!(state.begin_attempt(), None);
    }

    #[test]
    fn last_reason_names_the_strategy() {
        let mut state = RetryState::new(1, Duration::ZERO);
        assert_eq!(state.last_reason(), "no strategy produced content");
        state.record_failure(StrategyId::TlsProfile, "challenge: marker 'captcha'");
        assert_eq!(state.last_reason(), "tls_profile: challenge: marker 'captcha'");
    }
}
