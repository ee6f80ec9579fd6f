// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::PreemptionSettings;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TOKEN_PATH: &str = "/latest/api/token";
const NOTICE_PATH: &str = "/latest/meta-data/spot/instance-action";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: &str = "21600";

/// 抢占通知
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreemptionNotice {
    pub action: String,
    #[serde(default)]
    pub time: Option<String>,
}

impl PreemptionNotice {
    /// 是否为需要停机的动作
    pub fn is_forced_stop(&self) -> bool {
        matches!(
            self.action.to_ascii_lowercase().as_str(),
            "terminate" | "stop" | "hibernate"
        )
    }
}

/// 抢占监视器
///
/// 周期性轮询实例元数据端点，发现强制停机通知后触发共享的停机信号
pub struct PreemptionWatcher {
    client: Client,
    base_url: String,
    interval: Duration,
    shutdown: CancellationToken,
}

impl PreemptionWatcher {
    pub fn new(
        base_url: impl Into<String>,
        interval: Duration,
        request_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            interval,
            shutdown,
        })
    }

    pub fn from_settings(
        settings: &PreemptionSettings,
        shutdown: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        Self::new(
            settings.base_url.clone(),
            Duration::from_secs(settings.interval_secs),
            Duration::from_secs(settings.request_timeout_secs),
            shutdown,
        )
    }

    /// 单次轮询
    ///
    /// 网络错误、超时、解码失败和“无通知”都视为没有通知
    pub async fn check(&self) -> Option<PreemptionNotice> {
        let token = self
            .client
            .put(format!("{}{}", self.base_url, TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?
            .text()
            .await
            .ok()?;

        let response = match self
            .client
            .get(format!("{}{}", self.base_url, NOTICE_PATH))
            .header(TOKEN_HEADER, token.trim())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Preemption check failed: {}", e);
                return None;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<PreemptionNotice>().await {
                Ok(notice) if notice.is_forced_stop() => Some(notice),
                Ok(notice) => {
                    debug!("Ignoring instance action {:?}", notice.action);
                    None
                }
                Err(e) => {
                    debug!("Undecodable preemption notice: {}", e);
                    None
                }
            },
            StatusCode::NOT_FOUND => None,
            other => {
                debug!("Unexpected preemption endpoint status {}", other);
                None
            }
        }
    }

    /// 轮询直到发现通知或停机信号被其他来源触发
    ///
    /// 每次检查前先等待一个轮询间隔，包括第一次
    pub async fn run(self) -> Option<PreemptionNotice> {
        info!("Preemption watcher started, polling every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => return None,
            }

            let notice = tokio::select! {
                notice = self.check() => notice,
                _ = self.shutdown.cancelled() => return None,
            };
            if let Some(notice) = notice {
                warn!(
                    "Preemption notice received: {} at {}",
                    notice.action,
                    notice.time.as_deref().unwrap_or("unknown time")
                );
                self.shutdown.cancel();
                return Some(notice);
            }
        }
    }

    pub fn start(self) -> JoinHandle<Option<PreemptionNotice>> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn metadata_server(notice: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(TOKEN_PATH))
            .and(header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok-123"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(NOTICE_PATH))
            .and(header(TOKEN_HEADER, "tok-123"))
            .respond_with(notice)
            .mount(&server)
            .await;
        server
    }

    fn watcher(base_url: String, shutdown: CancellationToken) -> PreemptionWatcher {
        PreemptionWatcher::new(
            base_url,
            Duration::from_millis(20),
            Duration::from_secs(2),
            shutdown,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_terminate_notice_sets_shutdown() {
        let server = metadata_server(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"action": "terminate", "time": "2026-01-01T00:00:00Z"}),
        ))
        .await;
        let shutdown = CancellationToken::new();

        let notice = watcher(server.uri(), shutdown.clone()).run().await;

        assert_eq!(notice.unwrap().action, "terminate");
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_notice_keeps_polling_until_external_shutdown() {
        let server = metadata_server(ResponseTemplate::new(404)).await;
        let shutdown = CancellationToken::new();
        let handle = watcher(server.uri(), shutdown.clone()).start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!shutdown.is_cancelled());
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
        let polls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.to_string() == "GET")
            .count();
        assert!(polls >= 2);
    }

    #[tokio::test]
    async fn test_first_check_waits_one_interval() {
        let server = metadata_server(ResponseTemplate::new(404)).await;
        let shutdown = CancellationToken::new();
        let watcher = PreemptionWatcher::new(
            server.uri(),
            Duration::from_secs(30),
            Duration::from_secs(2),
            shutdown.clone(),
        )
        .unwrap();
        let handle = watcher.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_cancelled_watcher_never_polls() {
        let server = metadata_server(ResponseTemplate::new(404)).await;
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        assert!(watcher(server.uri(), shutdown).run().await.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_action_is_ignored() {
        let server = metadata_server(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"action": "reboot"})),
        )
        .await;
        let watcher = watcher(server.uri(), CancellationToken::new());

        assert!(watcher.check().await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_and_unreachable_endpoints_are_swallowed() {
        let server =
            metadata_server(ResponseTemplate::new(200).set_body_string("not json")).await;
        assert!(watcher(server.uri(), CancellationToken::new())
            .check()
            .await
            .is_none());

        let unreachable = watcher("http://127.0.0.1:9".to_string(), CancellationToken::new());
        assert!(unreachable.check().await.is_none());
    }
}
