// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 消息最终处置
///
/// 每次处理器调用恰好产生一个处置结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDisposition {
    /// 超过最大接收次数，已转入死信队列并删除
    DeadLettered,
    /// 消息体无效，直接删除
    Dropped,
    /// 处理完成，已投递续爬任务并删除
    Completed,
    /// 因停机中断，已投递带游标的续爬任务并删除
    Interrupted { next: Option<String> },
    /// 处理未达到确认条件，保留等待重新投递
    Retained,
    /// 处理中出现未处理错误，保留等待重新投递
    Abandoned,
}

impl MessageDisposition {
    /// 指标标签
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDisposition::DeadLettered => "dead_lettered",
            MessageDisposition::Dropped => "dropped",
            MessageDisposition::Completed => "completed",
            MessageDisposition::Interrupted { .. } => "interrupted",
            MessageDisposition::Retained => "retained",
            MessageDisposition::Abandoned => "abandoned",
        }
    }

    /// 该处置是否会删除原消息
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            MessageDisposition::DeadLettered
                | MessageDisposition::Dropped
                | MessageDisposition::Completed
                | MessageDisposition::Interrupted { .. }
        )
    }
}
