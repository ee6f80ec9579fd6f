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
use harvestrs::workers::manager::run_pool;
use harvestrs::workers::worker::{generic_worker, WorkerLoopConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn lot(domain: &str, n: usize) -> String {
    format!("https://{}/lot/{}", domain, n)
}

fn cancel_after(shutdown: &CancellationToken, after: Duration) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        shutdown.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn test_pool_processes_every_domain_then_drains() {
    let domains = ["a.test", "b.test", "c.test"];
    let queue = Arc::new(InMemoryQueue::new("domains", Duration::from_secs(600)));
    let storage = Arc::new(MemoryShopRepositoryImpl::new());
    let mut engine = FakeShopEngine::default();
    for domain in domains {
        storage.seed_products(domain, [lot(domain, 1), lot(domain, 2)]);
        engine = engine
            .with_page(lot(domain, 1), product_html(&format!("{}-1", domain), "5"))
            .with_page(lot(domain, 2), product_html(&format!("{}-2", domain), "6"));
        queue
            .send(&DomainJob::new(domain).to_body(), Duration::ZERO)
            .await
            .unwrap();
    }
    let engine = Arc::new(engine);
    let sink = Arc::new(CollectingSink::default());
    let shutdown = CancellationToken::new();

    let handler = Arc::new(DomainCrawlHandler::new(
        queue.clone(),
        storage.clone(),
        engine.clone(),
        sink.clone(),
        shutdown.clone(),
        DomainWorkerConfig::default(),
    ));

    cancel_after(&shutdown, Duration::from_secs(60));
    let inbound = queue.clone();
    let outcome = run_pool(
        2,
        shutdown,
        |id, token| {
            generic_worker(
                id,
                inbound.clone(),
                token,
                handler.clone(),
                WorkerLoopConfig::default(),
            )
        },
        Duration::from_secs(30),
    )
    .await;

    assert_eq!(outcome.finished, 2);
    assert!(!outcome.forced());
    assert_eq!(engine.fetches(), 6);
    assert_eq!(sink.item_ids().len(), 6);
    assert_eq!(sink.batch_count(), 3);

    // every domain acknowledged and rescheduled once
    let mut bodies = queue.bodies();
    bodies.sort();
    let expected: Vec<String> = domains
        .iter()
        .map(|d| DomainJob::new(*d).to_body())
        .collect();
    assert_eq!(bodies, expected);
    assert_eq!(queue.visible_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_domain_requeues_cursor() {
    let domain = "slow.test";
    let queue = Arc::new(InMemoryQueue::new("domains", Duration::from_secs(600)));
    let storage = Arc::new(MemoryShopRepositoryImpl::new());
    storage.seed_products(domain, [lot(domain, 1), lot(domain, 2)]);
    let engine = FakeShopEngine::default()
        .with_slow_page(lot(domain, 1), product_html("1", "5"), Duration::from_secs(500))
        .with_slow_page(lot(domain, 2), product_html("2", "5"), Duration::from_secs(500));
    queue
        .send(&DomainJob::new(domain).to_body(), Duration::ZERO)
        .await
        .unwrap();

    let sink = Arc::new(CollectingSink::default());
    let shutdown = CancellationToken::new();
    let handler = Arc::new(DomainCrawlHandler::new(
        queue.clone(),
        storage,
        Arc::new(engine),
        sink.clone(),
        shutdown.clone(),
        DomainWorkerConfig {
            fetch_timeout: Duration::from_secs(1000),
            ..DomainWorkerConfig::default()
        },
    ));

    cancel_after(&shutdown, Duration::from_secs(5));
    let inbound = queue.clone();
    let outcome = run_pool(
        1,
        shutdown,
        |id, token| {
            generic_worker(
                id,
                inbound.clone(),
                token,
                handler.clone(),
                WorkerLoopConfig::default(),
            )
        },
        Duration::from_secs(30),
    )
    .await;

    assert_eq!(outcome.finished, 1);
    assert_eq!(sink.batch_count(), 0);
    assert_eq!(
        queue.bodies(),
        vec![DomainJob::with_next(domain, lot(domain, 1)).to_body()]
    );
    assert_eq!(queue.visible_count(), 1);
}
