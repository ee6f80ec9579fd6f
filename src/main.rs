// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use harvestrs::config::settings::{QueueBackend, Settings, StorageBackend};
use harvestrs::domain::repositories::product_sink::ProductSink;
use harvestrs::domain::repositories::shop_repository::ShopRepository;
use harvestrs::engines::http_engine::HttpCrawlEngine;
use harvestrs::infrastructure::metrics::init_metrics;
use harvestrs::infrastructure::repositories::memory_shop_repo_impl::MemoryShopRepositoryImpl;
use harvestrs::infrastructure::repositories::redis_shop_repo_impl::RedisShopRepositoryImpl;
use harvestrs::infrastructure::sink::http_sink::{HttpProductSink, LoggingProductSink};
use harvestrs::queue::memory_queue::InMemoryQueue;
use harvestrs::queue::message_queue::MessageQueue;
use harvestrs::queue::sqs_queue::SqsQueue;
use harvestrs::utils::telemetry;
use harvestrs::workers::domain_worker::{DomainCrawlHandler, DomainWorkerConfig};
use harvestrs::workers::manager::run_pool;
use harvestrs::workers::preemption::PreemptionWatcher;
use harvestrs::workers::worker::{generic_worker, WorkerLoopConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 主函数
///
/// 加载配置，组装队列、存储、抓取引擎和下游接口，运行工作池直到停机
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.logging.json);
    info!("Starting harvestrs in {:?} mode...", settings.worker.mode);
    if settings.metrics.enabled {
        init_metrics(&settings.metrics.listen);
    }

    // 3. Queues
    let visibility = Duration::from_secs(settings.queue.visibility_timeout_secs);
    let (queue, dead_letter): (Arc<dyn MessageQueue>, Option<Arc<dyn MessageQueue>>) =
        match settings.queue.backend {
            QueueBackend::Sqs => {
                let queue_url = settings
                    .queue
                    .queue_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("queue.queue_url is required for the sqs backend"))?;
                let client = SqsQueue::client_from_settings(&settings.queue).await;
                let dead_letter = settings.queue.dead_letter_queue_url.clone().map(|url| {
                    Arc::new(SqsQueue::new(client.clone(), url, visibility)) as Arc<dyn MessageQueue>
                });
                let queue = Arc::new(SqsQueue::new(client, queue_url, visibility)) as Arc<dyn MessageQueue>;
                (queue, dead_letter)
            }
            QueueBackend::Memory => {
                warn!("Using in-memory queue, messages are lost on exit");
                let queue = Arc::new(InMemoryQueue::new("domains", visibility)) as Arc<dyn MessageQueue>;
                (queue, None)
            }
        };
    info!("Queue backend ready: {}", queue.name());

    // 4. Storage
    let storage: Arc<dyn ShopRepository> = match settings.storage.backend {
        StorageBackend::Redis => {
            let redis_url = settings
                .storage
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.redis_url is required for the redis backend"))?;
            Arc::new(RedisShopRepositoryImpl::new(redis_url).await?)
        }
        StorageBackend::Memory => Arc::new(MemoryShopRepositoryImpl::new()),
    };
    info!("Storage initialized");

    // 5. Downstream sink
    let sink: Arc<dyn ProductSink> = match &settings.sink.api_url {
        Some(api_url) => Arc::new(HttpProductSink::from_settings(api_url, &settings.sink)),
        None => Arc::new(LoggingProductSink),
    };

    // 6. Crawl engine
    let engine = Arc::new(HttpCrawlEngine::new(
        &settings.crawl.user_agent,
        Duration::from_secs(settings.crawl.request_timeout_secs),
    )?);

    // 7. Shutdown signal and preemption watcher
    let shutdown = CancellationToken::new();
    let watcher = if settings.preemption.enabled {
        Some(PreemptionWatcher::from_settings(&settings.preemption, shutdown.clone())?.start())
    } else {
        None
    };

    // 8. Worker pool
    let handler = Arc::new(
        DomainCrawlHandler::new(
            queue.clone(),
            storage,
            engine,
            sink,
            shutdown.clone(),
            DomainWorkerConfig::from_settings(&settings),
        )
        .with_dead_letter(dead_letter),
    );
    let loop_config = WorkerLoopConfig::from(&settings.queue);

    let outcome = run_pool(
        settings.worker.count,
        shutdown.clone(),
        |id, token| generic_worker(id, queue.clone(), token, handler.clone(), loop_config.clone()),
        Duration::from_secs(settings.worker.drain_timeout_secs),
    )
    .await;

    shutdown.cancel();
    if let Some(watcher) = watcher {
        if let Ok(Some(notice)) = watcher.await {
            info!("Stopped after preemption notice: {:?}", notice);
        }
    }

    if outcome.failed > 0 {
        anyhow::bail!("{} workers failed", outcome.failed);
    }
    info!("harvestrs stopped");
    Ok(())
}
