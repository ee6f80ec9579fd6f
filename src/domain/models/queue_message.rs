// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};

/// 队列消息
///
/// 消息本身归队列服务所有，工作器持有的只是一份租约：
/// `receipt_handle` 标识本次接收，在租约到期前可续约或删除。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// 队列分配的消息ID
    pub message_id: String,
    /// JSON消息体
    pub body: String,
    /// 本次接收的回执句柄
    pub receipt_handle: String,
    /// 已被接收的次数（包含本次）
    pub receive_count: u32,
    /// 接收时的可见性截止时间
    pub visible_until: DateTime<Utc>,
}

impl QueueMessage {
    /// 租约是否已经过期
    pub fn lease_expired(&self) -> bool {
        Utc::now() >= self.visible_until
    }
}
