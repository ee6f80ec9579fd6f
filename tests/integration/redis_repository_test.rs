// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::start_redis;
use chrono::{Duration as ChronoDuration, Utc};
use harvestrs::domain::models::shop::{ShopMetadata, UrlEntry};
use harvestrs::domain::repositories::shop_repository::ShopRepository;

const DOMAIN: &str = "antiques.test";

fn url(path: &str) -> String {
    format!("https://{}{}", DOMAIN, path)
}

/// 写入后按游标续读
///
/// 只有商品条目会被返回，顺序稳定，未知游标从头开始
#[tokio::test]
async fn test_upserted_products_resume_at_cursor() {
    let Some(redis) = start_redis().await else {
        return;
    };
    let repo = &redis.repo;

    repo.batch_write_url_entries(&[
        UrlEntry::discovered(DOMAIN, url("/lot/3"), true),
        UrlEntry::discovered(DOMAIN, url("/about"), false),
        UrlEntry::discovered(DOMAIN, url("/lot/1"), true),
    ])
    .await
    .unwrap();
    // second discovery upserts rather than duplicates
    repo.batch_write_url_entries(&[
        UrlEntry::discovered(DOMAIN, url("/lot/2"), true),
        UrlEntry::discovered(DOMAIN, url("/lot/1"), true),
    ])
    .await
    .unwrap();

    assert_eq!(
        repo.get_product_urls(DOMAIN, None).await.unwrap(),
        vec![url("/lot/1"), url("/lot/2"), url("/lot/3")]
    );
    assert_eq!(
        repo.get_product_urls(DOMAIN, Some(&url("/lot/2")))
            .await
            .unwrap(),
        vec![url("/lot/2"), url("/lot/3")]
    );
    assert_eq!(
        repo.get_product_urls(DOMAIN, Some(&url("/gone")))
            .await
            .unwrap()
            .len(),
        3
    );
    assert!(repo
        .get_product_urls("other.test", None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_rediscovery_keeps_recorded_hash() {
    let Some(redis) = start_redis().await else {
        return;
    };
    let repo = &redis.repo;

    repo.batch_write_url_entries(&[UrlEntry::scraped(
        DOMAIN,
        url("/lot/1"),
        "hash-a".to_string(),
        true,
    )])
    .await
    .unwrap();
    repo.batch_write_url_entries(&[UrlEntry::discovered(DOMAIN, url("/lot/1"), true)])
        .await
        .unwrap();

    assert_eq!(
        repo.get_url_hash(DOMAIN, &url("/lot/1")).await.unwrap(),
        Some("hash-a".to_string())
    );

    repo.update_url_hash(DOMAIN, &url("/lot/1"), "hash-b")
        .await
        .unwrap();
    assert_eq!(
        repo.get_url_hash(DOMAIN, &url("/lot/1")).await.unwrap(),
        Some("hash-b".to_string())
    );
    assert!(repo
        .get_url_hash(DOMAIN, &url("/lot/9"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_metadata_updates_merge() {
    let Some(redis) = start_redis().await else {
        return;
    };
    let repo = &redis.repo;
    assert!(repo.get_shop_metadata(DOMAIN).await.unwrap().is_none());

    let crawled = Utc::now() - ChronoDuration::hours(2);
    let mut discovery = ShopMetadata::new(DOMAIN);
    discovery.last_crawled_start = Some(crawled);
    discovery.last_crawled_end = Some(crawled);
    repo.update_shop_metadata(&discovery).await.unwrap();

    let scraped = Utc::now();
    let mut scrape = ShopMetadata::new(DOMAIN);
    scrape.standards_used = Some(true);
    scrape.last_scraped_start = Some(scraped);
    scrape.last_scraped_end = Some(scraped);
    repo.update_shop_metadata(&scrape).await.unwrap();

    // a later discovery leaves the scrape fields alone
    repo.update_shop_metadata(&discovery).await.unwrap();

    let stored = repo.get_shop_metadata(DOMAIN).await.unwrap().unwrap();
    assert_eq!(stored.domain, DOMAIN);
    assert_eq!(stored.last_crawled_start, Some(crawled));
    assert_eq!(stored.last_crawled_end, Some(crawled));
    assert_eq!(stored.last_scraped_start, Some(scraped));
    assert_eq!(stored.last_scraped_end, Some(scraped));
    assert_eq!(stored.standards_used, Some(true));
}
