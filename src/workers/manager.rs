// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 工作池运行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOutcome {
    /// 正常退出的工作器数
    pub finished: usize,
    /// 因排空超时被强制取消的工作器数
    pub cancelled: usize,
    /// 返回错误或崩溃的工作器数
    pub failed: usize,
}

impl PoolOutcome {
    /// 是否存在被强制取消的工作器
    pub fn forced(&self) -> bool {
        self.cancelled > 0
    }

    fn record<T>(&mut self, joined: Result<Result<T, WorkerError>, JoinError>, shutdown: &CancellationToken) {
        match joined {
            Ok(Ok(_)) => self.finished += 1,
            Ok(Err(e)) => {
                self.failed += 1;
                error!("Worker failed: {}", e);
                // A control-plane failure takes the whole pool down
                shutdown.cancel();
            }
            Err(e) if e.is_cancelled() => self.cancelled += 1,
            Err(e) => {
                self.failed += 1;
                error!("Worker panicked: {}", e);
                shutdown.cancel();
            }
        }
    }
}

/// 安装进程信号处理
///
/// 收到 Ctrl+C 或 SIGTERM 时触发停机信号
pub fn install_signal_handlers(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Unable to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Unable to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Ctrl+C received"),
            _ = terminate => info!("SIGTERM received"),
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    })
}

/// 运行工作池
///
/// 启动 `count` 个工作器并等待停机信号；停机后最多等待 `drain_timeout`
/// 让工作器自行退出，超时则强制取消剩余工作器并等待取消完成
pub async fn run_pool<F, Fut, T>(
    count: usize,
    shutdown: CancellationToken,
    factory: F,
    drain_timeout: Duration,
) -> PoolOutcome
where
    F: Fn(usize, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, WorkerError>> + Send + 'static,
    T: Send + 'static,
{
    let signals = install_signal_handlers(shutdown.clone());
    let mut workers = JoinSet::new();
    for id in 0..count {
        workers.spawn(factory(id, shutdown.clone()));
    }
    info!("Started {} workers", count);

    let mut outcome = PoolOutcome::default();
    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Shutdown requested, draining {} workers", workers.len());
        }
        _ = join_all(&mut workers, &mut outcome, &shutdown) => {
            info!("All workers exited before shutdown was requested");
        }
    }

    if !workers.is_empty() {
        let drained = tokio::time::timeout(
            drain_timeout,
            join_all(&mut workers, &mut outcome, &shutdown),
        )
        .await;

        if drained.is_err() {
            warn!(
                "Drain timeout of {:?} elapsed, cancelling {} workers",
                drain_timeout,
                workers.len()
            );
            workers.abort_all();
            join_all(&mut workers, &mut outcome, &shutdown).await;
        }
    }

    signals.abort();
    info!("Worker pool stopped: {:?}", outcome);
    outcome
}

async fn join_all<T: 'static>(
    workers: &mut JoinSet<Result<T, WorkerError>>,
    outcome: &mut PoolOutcome,
    shutdown: &CancellationToken,
) {
    while let Some(joined) = workers.join_next().await {
        outcome.record(joined, shutdown);
    }
}
