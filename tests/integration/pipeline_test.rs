// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::product_html;
use axum::{extract::Path, response::Html, routing::get, Router};
use harvestrs::config::settings::SinkSettings;
use harvestrs::domain::models::job::DomainJob;
use harvestrs::domain::repositories::shop_repository::ShopRepository;
use harvestrs::engines::http_engine::HttpCrawlEngine;
use harvestrs::infrastructure::repositories::memory_shop_repo_impl::MemoryShopRepositoryImpl;
use harvestrs::infrastructure::sink::http_sink::HttpProductSink;
use harvestrs::queue::memory_queue::InMemoryQueue;
use harvestrs::queue::message_queue::MessageQueue;
use harvestrs::workers::domain_worker::{DomainCrawlHandler, DomainWorkerConfig};
use harvestrs::workers::worker::MessageHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOMAIN: &str = "auction.test";

async fn start_shop() -> String {
    let app = Router::new().route(
        "/lots/{id}",
        get(|Path(id): Path<String>| async move {
            let price = if id == "2" { "249,00" } else { "99.50" };
            Html(product_html(&id, price))
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn start_catalog() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn handler(
    queue: Arc<InMemoryQueue>,
    storage: Arc<MemoryShopRepositoryImpl>,
    catalog: &MockServer,
) -> DomainCrawlHandler {
    let sink = HttpProductSink::from_settings(
        &format!("{}/api/v1/items", catalog.uri()),
        &SinkSettings {
            api_url: None,
            timeout_secs: 5,
            max_retries: 1,
        },
    );
    let engine = HttpCrawlEngine::new("harvestrs-test", Duration::from_secs(2)).unwrap();
    DomainCrawlHandler::new(
        queue,
        storage,
        Arc::new(engine),
        Arc::new(sink),
        CancellationToken::new(),
        DomainWorkerConfig {
            batch_size: 10,
            fetch_timeout: Duration::from_secs(5),
            ..DomainWorkerConfig::default()
        },
    )
}

async fn deliver(queue: &InMemoryQueue) -> harvestrs::domain::models::queue_message::QueueMessage {
    queue
        .send(&DomainJob::new(DOMAIN).to_body(), Duration::ZERO)
        .await
        .unwrap();
    queue.receive(1, Duration::ZERO).await.unwrap().pop().unwrap()
}

#[tokio::test]
async fn test_scrape_pipeline_forwards_then_skips_unchanged() {
    let shop = start_shop().await;
    let catalog = start_catalog().await;
    let queue = Arc::new(InMemoryQueue::new("domains", Duration::from_secs(60)));
    let storage = Arc::new(MemoryShopRepositoryImpl::new());
    storage.seed_products(
        DOMAIN,
        [format!("{}/lots/1", shop), format!("{}/lots/2", shop)],
    );

    let handler = handler(queue.clone(), storage.clone(), &catalog);

    // first pass forwards both lots
    let message = deliver(&queue).await;
    handler.handle(message).await.unwrap();

    let requests = catalog.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["shopsItemId"], "2");
    assert_eq!(items[1]["price"]["amount"], 24900);
    assert_eq!(items[1]["state"], "AVAILABLE");
    assert!(storage
        .get_url_hash(DOMAIN, &format!("{}/lots/1", shop))
        .await
        .unwrap()
        .is_some());

    // second pass sees identical state and forwards nothing
    let message = deliver(&queue).await;
    handler.handle(message).await.unwrap();
    assert_eq!(catalog.received_requests().await.unwrap().len(), 1);

    // each pass leaves exactly one delayed continuation
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.visible_count(), 0);
}

#[tokio::test]
async fn test_unreachable_pages_do_not_block_the_domain() {
    let shop = start_shop().await;
    let catalog = start_catalog().await;
    let queue = Arc::new(InMemoryQueue::new("domains", Duration::from_secs(60)));
    let storage = Arc::new(MemoryShopRepositoryImpl::new());
    storage.seed_products(
        DOMAIN,
        [
            format!("{}/lots/7", shop),
            format!("{}/missing", shop),
            "http://127.0.0.1:1/lots/9".to_string(),
        ],
    );

    let message = deliver(&queue).await;
    handler(queue.clone(), storage.clone(), &catalog)
        .handle(message)
        .await
        .unwrap();

    let requests = catalog.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["shopsItemId"], "7");
    assert!(storage.metadata(DOMAIN).unwrap().last_scraped_end.is_some());
}
