// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::QueueSettings;
use crate::domain::models::queue_message::QueueMessage;
use crate::queue::message_queue::MessageQueue;
use crate::utils::errors::WorkerError;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 消息处理器特质
///
/// 消息的最终处置（删除或留待重投）由处理器负责
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: MessageHandler + ?Sized> MessageHandler for Arc<T> {
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()> {
        (**self).handle(message).await
    }
}

/// 工作循环配置
#[derive(Debug, Clone)]
pub struct WorkerLoopConfig {
    /// 单次接收的最大消息数
    pub max_messages: usize,
    /// 长轮询等待时长
    pub wait_time: Duration,
    /// 停机竞争中被接收消息的禁运时长
    pub embargo: Duration,
}

impl Default for WorkerLoopConfig {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time: Duration::from_secs(20),
            embargo: Duration::from_secs(120),
        }
    }
}

impl From<&QueueSettings> for WorkerLoopConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            max_messages: settings.max_messages.max(1),
            wait_time: settings.wait_time(),
            embargo: settings.embargo(),
        }
    }
}

/// 工作循环统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// 交给处理器的消息数
    pub handled: usize,
    /// 处理器返回错误或崩溃的次数
    pub handler_failures: usize,
    /// 停机时被禁运的消息数
    pub embargoed: usize,
}

/// 通用工作循环
///
/// 每轮并发发起一次有界接收和停机等待，取先完成者。
/// 停机先到时，若接收已经拿到消息（被“偷走”的消息），
/// 将其租约延长到禁运窗口后退出，不调用处理器
pub async fn generic_worker<H>(
    id: usize,
    queue: Arc<dyn MessageQueue>,
    shutdown: CancellationToken,
    handler: Arc<H>,
    config: WorkerLoopConfig,
) -> Result<WorkerSummary, WorkerError>
where
    H: MessageHandler + ?Sized,
{
    info!(worker_id = id, "Worker started on {}", queue.name());
    let mut summary = WorkerSummary::default();

    while !shutdown.is_cancelled() {
        let receiver = queue.clone();
        let (max, wait) = (config.max_messages, config.wait_time);
        let mut receive = tokio::spawn(async move { receiver.receive(max, wait).await });

        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                receive.abort();
                if let Ok(Ok(stolen)) = receive.await {
                    summary.embargoed +=
                        embargo_all(id, queue.as_ref(), &stolen, config.embargo).await;
                }
                break;
            }
            joined = &mut receive => joined,
        };

        let messages = received.map_err(|e| WorkerError::Join(e.to_string()))??;
        let mut pending = messages.into_iter();
        while let Some(message) = pending.next() {
            if shutdown.is_cancelled() {
                let rest: Vec<QueueMessage> = std::iter::once(message).chain(pending).collect();
                summary.embargoed += embargo_all(id, queue.as_ref(), &rest, config.embargo).await;
                break;
            }

            summary.handled += 1;
            let message_id = message.message_id.clone();
            match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
                Ok(Ok(())) => debug!(worker_id = id, %message_id, "Message handled"),
                Ok(Err(e)) => {
                    summary.handler_failures += 1;
                    error!(worker_id = id, %message_id, "Handler failed: {:#}", e);
                }
                Err(_) => {
                    summary.handler_failures += 1;
                    error!(worker_id = id, %message_id, "Handler panicked");
                }
            }
        }
    }

    info!(worker_id = id, "Worker stopped: {:?}", summary);
    Ok(summary)
}

/// 把消息租约延长到禁运窗口，返回成功数量
async fn embargo_all(
    id: usize,
    queue: &dyn MessageQueue,
    messages: &[QueueMessage],
    embargo: Duration,
) -> usize {
    let mut embargoed = 0;
    for message in messages {
        match queue.extend_lease(message, embargo).await {
            Ok(()) => {
                embargoed += 1;
                warn!(
                    worker_id = id,
                    message_id = %message.message_id,
                    "Received message during shutdown, embargoed for {:?}", embargo
                );
            }
            Err(e) => error!(
                worker_id = id,
                message_id = %message.message_id,
                "Failed to embargo message: {}", e
            ),
        }
    }
    embargoed
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
