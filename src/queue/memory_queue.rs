// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_message::QueueMessage;
use crate::queue::message_queue::{MessageQueue, QueueError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    visible_at: Instant,
    receive_count: u32,
    receipt: Option<String>,
}

/// 内存租约队列
///
/// 语义与托管队列一致：可见性超时、回执句柄、延迟投递、接收计数。
/// 使用 tokio 时钟，可在暂停时间的测试中推进
pub struct InMemoryQueue {
    name: String,
    visibility_timeout: Duration,
    messages: Mutex<Vec<StoredMessage>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            visibility_timeout,
            messages: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// 队列中的消息总数（含不可见）
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前可见的消息数
    pub fn visible_count(&self) -> usize {
        let now = Instant::now();
        self.messages
            .lock()
            .iter()
            .filter(|m| m.visible_at <= now)
            .count()
    }

    /// 所有消息体，按入队顺序
    pub fn bodies(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.body.clone()).collect()
    }

    /// 消息剩余不可见时长，已可见时为零
    pub fn invisible_for(&self, message_id: &str) -> Option<Duration> {
        let now = Instant::now();
        self.messages
            .lock()
            .iter()
            .find(|m| m.message_id == message_id)
            .map(|m| m.visible_at.saturating_duration_since(now))
    }

    fn take_visible(&self, max: usize) -> (Vec<QueueMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut messages = self.messages.lock();
        let mut received = Vec::new();
        let mut next_visible: Option<Instant> = None;

        for stored in messages.iter_mut() {
            if received.len() >= max {
                break;
            }
            if stored.visible_at > now {
                next_visible = Some(match next_visible {
                    Some(t) => t.min(stored.visible_at),
                    None => stored.visible_at,
                });
                continue;
            }

            let receipt = Uuid::new_v4().to_string();
            stored.receipt = Some(receipt.clone());
            stored.receive_count += 1;
            stored.visible_at = now + self.visibility_timeout;

            received.push(QueueMessage {
                message_id: stored.message_id.clone(),
                body: stored.body.clone(),
                receipt_handle: receipt,
                receive_count: stored.receive_count,
                visible_until: Utc::now()
                    + chrono::Duration::from_std(self.visibility_timeout)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
            });
        }

        (received, next_visible)
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        let max = max.max(1);

        loop {
            let notified = self.notify.notified();
            let (received, next_visible) = self.take_visible(max);
            if !received.is_empty() {
                return Ok(received);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let wake_at = next_visible.map_or(deadline, |t| t.min(deadline));

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn extend_lease(&self, message: &QueueMessage, timeout: Duration) -> Result<(), QueueError> {
        let mut messages = self.messages.lock();
        let stored = messages
            .iter_mut()
            .find(|m| m.receipt.as_deref() == Some(message.receipt_handle.as_str()))
            .ok_or_else(|| QueueError::InvalidReceipt(message.receipt_handle.clone()))?;

        stored.visible_at = Instant::now() + timeout;
        drop(messages);
        if timeout.is_zero() {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut messages = self.messages.lock();
        let position = messages
            .iter()
            .position(|m| m.receipt.as_deref() == Some(message.receipt_handle.as_str()))
            .ok_or_else(|| QueueError::InvalidReceipt(message.receipt_handle.clone()))?;
        messages.remove(position);
        Ok(())
    }

    async fn send(&self, body: &str, delay: Duration) -> Result<String, QueueError> {
        let message_id = Uuid::new_v4().to_string();
        self.messages.lock().push(StoredMessage {
            message_id: message_id.clone(),
            body: body.to_string(),
            visible_at: Instant::now() + delay,
            receive_count: 0,
            receipt: None,
        });
        self.notify.notify_waiters();
        Ok(message_id)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
