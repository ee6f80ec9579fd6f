// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::product::ExtractedProduct;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 下游提交错误
#[derive(Error, Debug)]
pub enum SinkError {
    /// 请求失败
    #[error("Sink request failed: {0}")]
    Request(String),
    /// 下游返回非成功状态
    #[error("Sink rejected batch with status {0}")]
    Rejected(u16),
    /// 重试次数耗尽
    #[error("Sink gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// 商品下游接口
///
/// 接收一批提取出的商品记录，提交给目录后端
#[async_trait]
pub trait ProductSink: Send + Sync {
    async fn submit(&self, items: &[ExtractedProduct]) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: ProductSink + ?Sized> ProductSink for Arc<T> {
    async fn submit(&self, items: &[ExtractedProduct]) -> Result<(), SinkError> {
        (**self).submit(items).await
    }
}
