// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{QueueBackend, Settings, StorageBackend, WorkerMode};
use std::time::Duration;

fn default_settings() -> Settings {
    Settings::builder()
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap()
}

#[test]
fn test_defaults_deserialize() {
    let settings = default_settings();

    assert_eq!(settings.queue.backend, QueueBackend::Sqs);
    assert_eq!(settings.queue.embargo(), Duration::from_secs(120));
    assert_eq!(settings.queue.max_messages, 1);
    assert_eq!(settings.worker.mode, WorkerMode::Scrape);
    assert_eq!(settings.worker.count, 10);
    assert_eq!(settings.worker.drain_timeout_secs, 90);
    assert_eq!(settings.storage.backend, StorageBackend::Redis);
    assert!(settings.sink.api_url.is_none());
    assert!(settings.crawl.max_pages.is_none());
    assert!(settings
        .crawl
        .exclude_extensions
        .iter()
        .any(|ext| ext == "pdf"));
}

#[test]
fn test_heartbeat_interval_shorter_than_extension() {
    // A renewal must land before the previous extension runs out.
    let settings = default_settings();
    assert!(settings.heartbeat.interval() < settings.heartbeat.extend_timeout());
    assert!(
        settings.heartbeat.extend_timeout()
            <= Duration::from_secs(settings.queue.visibility_timeout_secs)
    );
}

#[test]
fn test_preemption_defaults() {
    let settings = default_settings();
    assert!(settings.preemption.enabled);
    assert_eq!(settings.preemption.interval_secs, 5);
    assert_eq!(settings.preemption.base_url, "http://169.254.169.254");
}

#[test]
fn test_environment_overrides_defaults() {
    let vars: config::Map<String, String> = [
        ("HARVEST__WORKER__MODE", "discover"),
        ("HARVEST__WORKER__CLASSIFIER_THREADS", "2"),
        ("HARVEST__QUEUE__BACKEND", "memory"),
        ("HARVEST__CRAWL__EXCLUDE_EXTENSIONS", "pdf,zip"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let settings: Settings = Settings::builder()
        .unwrap()
        .add_source(Settings::environment().source(Some(vars)))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    assert_eq!(settings.worker.mode, WorkerMode::Discover);
    assert_eq!(settings.worker.classifier_threads, 2);
    assert_eq!(settings.queue.backend, QueueBackend::Memory);
    assert_eq!(settings.crawl.exclude_extensions, vec!["pdf", "zip"]);
}
