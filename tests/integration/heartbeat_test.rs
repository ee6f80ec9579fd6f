// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{product_html, CollectingSink, FakeShopEngine};
use harvestrs::domain::models::job::DomainJob;
use harvestrs::infrastructure::repositories::memory_shop_repo_impl::MemoryShopRepositoryImpl;
use harvestrs::queue::memory_queue::InMemoryQueue;
use harvestrs::queue::message_queue::MessageQueue;
use harvestrs::workers::domain_worker::{DomainCrawlHandler, DomainWorkerConfig};
use harvestrs::workers::worker::MessageHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DOMAIN: &str = "slow.test";
const LOT: &str = "https://slow.test/lot/1";

struct SlowDomain {
    queue: Arc<InMemoryQueue>,
    sink: Arc<CollectingSink>,
    handler: DomainCrawlHandler,
}

fn slow_domain(heartbeat_interval: Duration) -> SlowDomain {
    let queue = Arc::new(InMemoryQueue::new("domains", Duration::from_secs(30)));
    let storage = Arc::new(MemoryShopRepositoryImpl::new());
    storage.seed_products(DOMAIN, [LOT]);
    let engine = FakeShopEngine::default().with_slow_page(
        LOT,
        product_html("1", "10"),
        Duration::from_secs(100),
    );
    let sink = Arc::new(CollectingSink::default());

    let handler = DomainCrawlHandler::new(
        queue.clone(),
        storage,
        Arc::new(engine),
        sink.clone(),
        CancellationToken::new(),
        DomainWorkerConfig {
            fetch_timeout: Duration::from_secs(200),
            heartbeat_interval,
            heartbeat_extend: Duration::from_secs(20),
            ..DomainWorkerConfig::default()
        },
    );
    SlowDomain {
        queue,
        sink,
        handler,
    }
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_long_running_message_invisible() {
    let SlowDomain {
        queue,
        sink,
        handler,
    } = slow_domain(Duration::from_secs(10));
    queue
        .send(&DomainJob::new(DOMAIN).to_body(), Duration::ZERO)
        .await
        .unwrap();
    let message = queue.receive(1, Duration::ZERO).await.unwrap().pop().unwrap();

    let running = tokio::spawn(async move { handler.handle(message).await });

    // sampled well past the 30s default lease
    for _ in 0..9 {
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(queue.receive(1, Duration::ZERO).await.unwrap().is_empty());
    }

    running.await.unwrap().unwrap();
    assert_eq!(sink.item_ids(), vec!["1".to_string()]);
    // only the delayed continuation remains
    assert_eq!(queue.bodies(), vec![DomainJob::new(DOMAIN).to_body()]);
}

#[tokio::test(start_paused = true)]
async fn test_lease_lapses_without_renewal() {
    let SlowDomain { queue, handler, .. } = slow_domain(Duration::from_secs(3600));
    queue
        .send(&DomainJob::new(DOMAIN).to_body(), Duration::ZERO)
        .await
        .unwrap();
    let message = queue.receive(1, Duration::ZERO).await.unwrap().pop().unwrap();

    let _running = tokio::spawn(async move { handler.handle(message).await });

    tokio::time::sleep(Duration::from_secs(31)).await;
    let redelivered = queue.receive(1, Duration::ZERO).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].receive_count, 2);
}
