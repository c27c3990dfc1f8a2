//! 终端进度渲染 (Terminal UI Progress)
//!
//! 基于 `indicatif` 的单行 spinner，实时反映编排器的尝试、挑战与退避状态。

use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;

use crate::core::event::{EventReceiver, FetchEvent};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// 进度协调器
pub struct Ui;

impl Ui {
    /// 启动事件监听循环；发送端全部释放后结束
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut bar: Option<ProgressBar> = None;
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(&mut bar, event);
            }
            if let Some(bar) = bar.take()
                && !bar.is_finished()
            {
                bar.finish_and_clear();
            }
        })
    }

    fn handle_event(slot: &mut Option<ProgressBar>, event: FetchEvent) {
        let message = status_line(&event);

        match event {
            FetchEvent::AttemptStarted { .. } => {
                let bar = slot.get_or_insert_with(spinner);
                if bar.is_finished() {
                    *bar = spinner();
                }
                bar.set_message(message);
            }
            FetchEvent::Succeeded { .. } => {
                if let Some(bar) = slot.take() {
                    bar.finish_with_message(message);
                }
            }
            FetchEvent::Exhausted { .. } | FetchEvent::Cancelled => {
                if let Some(bar) = slot.take() {
                    bar.abandon_with_message(message);
                }
            }
            _ => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message(message);
                }
            }
        }
    }
}

fn spinner() -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let bar = get_multi().add(ProgressBar::new_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// 事件对应的状态行文本
fn status_line(event: &FetchEvent) -> String {
    match event {
        FetchEvent::AttemptStarted {
            url,
            attempt,
            max_attempts,
        } => format!("🌐 [{}/{}] {}", attempt, max_attempts, truncate_string(url, 60)),
        FetchEvent::StrategyFailed { strategy, error } => {
            format!("⚠️ {} failed: {}", strategy, truncate_string(error, 60))
        }
        FetchEvent::ChallengeDetected { strategy, reason } => {
            format!("🛡️ CHALLENGE via {}: {}", strategy, reason)
        }
        FetchEvent::ProxyDropped { proxy, remaining } => {
            format!("🔌 proxy {} dropped ({} left)", proxy, remaining)
        }
        FetchEvent::BackingOff { attempt, delay_secs } => {
            format!("⏳ attempt {} failed, retrying in {}s", attempt, delay_secs)
        }
        FetchEvent::Succeeded { strategy, bytes } => {
            format!("✅ {} bytes via {}", bytes, strategy)
        }
        FetchEvent::Exhausted { attempts } => format!("❌ gave up after {} attempts", attempts),
        FetchEvent::Cancelled => "🛑 CANCELLED".to_string(),
    }
}

/// 按字符数截断
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
