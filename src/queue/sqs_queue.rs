// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::QueueSettings;
use crate::domain::models::queue_message::QueueMessage;
use crate::queue::message_queue::{MessageQueue, QueueError};
use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use chrono::Utc;
use std::time::Duration;
use tracing::warn;

/// SQS 单次接收的上限
const SQS_MAX_MESSAGES: usize = 10;
/// SQS 长轮询的上限
const SQS_MAX_WAIT_SECS: u64 = 20;
/// SQS 可见性超时的上限（12小时）
const SQS_MAX_VISIBILITY_SECS: u64 = 43_200;
/// SQS 延迟投递的上限
const SQS_MAX_DELAY_SECS: u64 = 900;

/// SQS 消息队列实现
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    visibility_timeout: Duration,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            visibility_timeout,
        }
    }

    /// 根据配置构建共享的 SQS 客户端
    pub async fn client_from_settings(settings: &QueueSettings) -> aws_sdk_sqs::Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(aws_sdk_sqs::config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_sqs::Client::from_conf(builder.build())
    }
}

fn clamp_secs(duration: Duration, max: u64) -> i32 {
    duration.as_secs().min(max) as i32
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.clamp(1, SQS_MAX_MESSAGES) as i32)
            .wait_time_seconds(clamp_secs(wait, SQS_MAX_WAIT_SECS))
            .visibility_timeout(clamp_secs(self.visibility_timeout, SQS_MAX_VISIBILITY_SECS))
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.into_service_error().to_string()))?;

        let visible_until = Utc::now()
            + chrono::Duration::from_std(self.visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::zero());

        let mut messages = Vec::new();
        for message in output.messages.unwrap_or_default() {
            let (Some(receipt_handle), Some(message_id)) = (message.receipt_handle, message.message_id)
            else {
                warn!("Skipping SQS message without receipt handle or id");
                continue;
            };
            let receive_count = message
                .attributes
                .as_ref()
                .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|c| c.parse().ok())
                .unwrap_or(1);

            messages.push(QueueMessage {
                message_id,
                body: message.body.unwrap_or_default(),
                receipt_handle,
                receive_count,
                visible_until,
            });
        }
        Ok(messages)
    }

    async fn extend_lease(&self, message: &QueueMessage, timeout: Duration) -> Result<(), QueueError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .visibility_timeout(clamp_secs(timeout, SQS_MAX_VISIBILITY_SECS))
            .send()
            .await
            .map_err(|e| QueueError::ExtendLease(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn send(&self, body: &str, delay: Duration) -> Result<String, QueueError> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .delay_seconds(clamp_secs(delay, SQS_MAX_DELAY_SECS))
            .send()
            .await
            .map_err(|e| QueueError::Send(e.into_service_error().to_string()))?;
        Ok(output.message_id.unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.queue_url
    }
}
