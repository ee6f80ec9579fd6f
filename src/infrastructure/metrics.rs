// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const MESSAGES_TOTAL: &str = "harvest_messages_total";
pub const URLS_FETCHED_TOTAL: &str = "harvest_urls_fetched_total";
pub const ITEMS_FORWARDED_TOTAL: &str = "harvest_items_forwarded_total";
pub const ITEMS_UNCHANGED_TOTAL: &str = "harvest_items_unchanged_total";
pub const LEASE_EXTENSIONS_TOTAL: &str = "harvest_lease_extensions_total";
pub const BATCH_FLUSH_SECONDS: &str = "harvest_batch_flush_seconds";

/// 安装 Prometheus 导出器
pub fn init_metrics(listen: &str) {
    let addr: SocketAddr = match listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics listen address {:?}: {}", listen, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    info!("Metrics exporter listening on {}", addr);
}
