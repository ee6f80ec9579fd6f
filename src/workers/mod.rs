// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供工作池、通用消息循环、租约心跳、抢占监视
/// 以及按域名的爬取编排
pub mod batch_sender;
pub mod domain_worker;
pub mod heartbeat;
pub mod manager;
pub mod preemption;
pub mod worker;

pub use domain_worker::DomainCrawlHandler;
pub use manager::run_pool;
pub use worker::generic_worker;
