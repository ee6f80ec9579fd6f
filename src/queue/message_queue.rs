// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_message::QueueMessage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 队列错误类型
///
/// 属于控制面故障，不在处理器内吞掉
#[derive(Error, Debug)]
pub enum QueueError {
    /// 接收失败
    #[error("Receive failed: {0}")]
    Receive(String),
    /// 发送失败
    #[error("Send failed: {0}")]
    Send(String),
    /// 删除失败
    #[error("Delete failed: {0}")]
    Delete(String),
    /// 续约失败
    #[error("Lease extension failed: {0}")]
    ExtendLease(String),
    /// 回执句柄无效或已过期
    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),
}

/// 消息队列特质
///
/// 至少一次投递：未删除且未续约的租约到期后消息重新可见
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 接收最多 `max` 条消息，最长等待 `wait`
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// 将消息租约延长到从现在起 `timeout`
    async fn extend_lease(&self, message: &QueueMessage, timeout: Duration) -> Result<(), QueueError>;

    /// 确认并删除消息
    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// 发送消息，`delay` 后可见，返回消息ID
    async fn send(&self, body: &str, delay: Duration) -> Result<String, QueueError>;

    /// 队列名称，用于日志
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: MessageQueue + ?Sized> MessageQueue for Arc<T> {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).receive(max, wait).await
    }

    async fn extend_lease(&self, message: &QueueMessage, timeout: Duration) -> Result<(), QueueError> {
        (**self).extend_lease(message, timeout).await
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        (**self).delete(message).await
    }

    async fn send(&self, body: &str, delay: Duration) -> Result<String, QueueError> {
        (**self).send(body, delay).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
