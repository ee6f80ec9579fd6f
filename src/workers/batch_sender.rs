// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::product::ExtractedProduct;
use crate::domain::models::shop::UrlEntry;
use crate::domain::repositories::product_sink::{ProductSink, SinkError};
use crate::domain::repositories::shop_repository::{ShopRepository, StorageError};
use crate::infrastructure::metrics::{BATCH_FLUSH_SECONDS, ITEMS_FORWARDED_TOTAL};
use metrics::{counter, histogram};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// 批量发送错误
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// 待发送的商品及其新的URL条目
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub product: ExtractedProduct,
    pub entry: UrlEntry,
}

/// 批量发送统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// 已提交的商品数
    pub forwarded: usize,
    /// 已提交的批次数
    pub batches: usize,
}

/// 批量发送器
///
/// 通过有界通道接收商品，攒满 `batch_size` 或通道关闭时提交到下游；
/// 提交成功后才写回新的哈希，失败时停止消费，上游发送随即失败
pub struct BatchSender {
    sink: Arc<dyn ProductSink>,
    storage: Arc<dyn ShopRepository>,
    batch_size: usize,
}

impl BatchSender {
    pub fn new(sink: Arc<dyn ProductSink>, storage: Arc<dyn ShopRepository>, batch_size: usize) -> Self {
        Self {
            sink,
            storage,
            batch_size: batch_size.max(1),
        }
    }

    /// 启动发送任务，返回通道发送端和任务句柄
    pub fn spawn(
        self,
        capacity: usize,
    ) -> (
        mpsc::Sender<BatchItem>,
        JoinHandle<Result<BatchSummary, BatchError>>,
    ) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    async fn run(self, mut rx: mpsc::Receiver<BatchItem>) -> Result<BatchSummary, BatchError> {
        let mut summary = BatchSummary::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(item) = rx.recv().await {
            batch.push(item);
            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut summary).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut summary).await?;
        }

        debug!("Batch sender finished: {:?}", summary);
        Ok(summary)
    }

    async fn flush(&self, batch: &mut Vec<BatchItem>, summary: &mut BatchSummary) -> Result<(), BatchError> {
        let started = Instant::now();
        let (products, entries): (Vec<_>, Vec<_>) =
            batch.drain(..).map(|item| (item.product, item.entry)).unzip();

        self.sink.submit(&products).await?;
        self.storage.batch_write_url_entries(&entries).await?;

        histogram!(BATCH_FLUSH_SECONDS).record(started.elapsed().as_secs_f64());
        counter!(ITEMS_FORWARDED_TOTAL).increment(products.len() as u64);
        summary.forwarded += products.len();
        summary.batches += 1;
        info!("Forwarded batch of {} items", products.len());
        Ok(())
    }
}
