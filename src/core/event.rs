//! 事件系统定义
//!
//! 用于编排器与 UI 之间的完全解耦通信

use flume::{Receiver, Sender};

use crate::interfaces::StrategyId;

/// 采集过程事件
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// 新一轮尝试开始
    AttemptStarted {
        url: String,
        attempt: u32,
        max_attempts: u32,
    },

    /// 策略发生技术性失败
    StrategyFailed { strategy: StrategyId, error: String },

    /// 策略返回了挑战页
    ChallengeDetected { strategy: StrategyId, reason: String },

    /// 代理被移出轮换
    ProxyDropped { proxy: String, remaining: usize },

    /// 本轮全部失败，进入退避
    BackingOff { attempt: u32, delay_secs: u64 },

    /// 取得有效内容
    Succeeded { strategy: StrategyId, bytes: usize },

    /// 尝试耗尽
    Exhausted { attempts: u32 },

    /// 调用方取消
    Cancelled,
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<FetchEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<FetchEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件
    pub fn emit(&self, event: FetchEvent) {
        let _ = self.tx.send(event);
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<FetchEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<FetchEvent>) -> Self {
        Self { rx }
    }

    /// 非阻塞接收事件
    pub fn try_recv(&self) -> Option<FetchEvent> {
        self.rx.try_recv().ok()
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<FetchEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
