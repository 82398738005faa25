//! 定期ヘルスチェックスケジューラー
//!
//! `start`でバックグラウンドループを起動し、一定間隔で全登録エンドポイントを
//! 並列にチェックする。各ループは専用の`CancellationToken`で停止する。
//!
//! - 1tick内の同時実行数はセマフォで制限
//! - 前回のチェックが完了していないエンドポイントは次のtickでスキップ
//! - チェックの失敗でループが止まることはない

use crate::common::error::ValidationError;
use crate::events::{MonitorEvent, SharedEventBus};
use crate::executor::RequestExecutor;
use crate::history::HistoryStore;
use crate::registry::{EndpointRegistry, HealthRegistry, MonitoredEndpoint};
use crate::types::health::HealthStatus;
use crate::types::history::RecordOrigin;
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 1回のtickの実行結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// チェックを実行した件数
    pub checked: usize,
    /// 前回のチェックが実行中のためスキップした件数
    pub skipped: usize,
}

enum SchedulerState {
    Stopped,
    Running {
        interval: Duration,
        cancel: CancellationToken,
    },
}

/// チェック実行に必要な共有リソース
struct CheckContext {
    endpoints: EndpointRegistry,
    health: HealthRegistry,
    history: HistoryStore,
    executor: RequestExecutor,
    events: SharedEventBus,
    check_timeout: Duration,
    max_concurrent_checks: usize,
    in_flight: StdMutex<HashSet<String>>,
}

/// 実行中エンドポイントの登録を解除するガード
struct InFlightGuard {
    ctx: Arc<CheckContext>,
    endpoint_id: String,
}

impl InFlightGuard {
    fn acquire(ctx: &Arc<CheckContext>, endpoint_id: &str) -> Option<Self> {
        let mut in_flight = ctx.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(endpoint_id.to_string()) {
            return None;
        }
        Some(Self {
            ctx: Arc::clone(ctx),
            endpoint_id: endpoint_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ctx
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.endpoint_id);
    }
}

/// 監視スケジューラー
///
/// `stopped` → `running`（`start`）→ `stopped`（`stop`）の2状態を持つ。
#[derive(Clone)]
pub struct MonitorScheduler {
    ctx: Arc<CheckContext>,
    state: Arc<Mutex<SchedulerState>>,
}

impl MonitorScheduler {
    /// 新しいスケジューラーを作成（停止状態）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoints: EndpointRegistry,
        health: HealthRegistry,
        history: HistoryStore,
        executor: RequestExecutor,
        events: SharedEventBus,
        check_timeout: Duration,
        max_concurrent_checks: usize,
    ) -> Self {
        Self {
            ctx: Arc::new(CheckContext {
                endpoints,
                health,
                history,
                executor,
                events,
                check_timeout,
                max_concurrent_checks: max_concurrent_checks.max(1),
                in_flight: StdMutex::new(HashSet::new()),
            }),
            state: Arc::new(Mutex::new(SchedulerState::Stopped)),
        }
    }

    /// 定期監視を開始
    ///
    /// 実行中に呼ばれた場合は間隔を置き換える（エンドポイントの状態は保持）。
    /// 最初のtickは即座に実行される。
    pub async fn start(&self, interval_secs: u64) -> Result<(), ValidationError> {
        if interval_secs == 0 {
            return Err(ValidationError::InvalidInterval);
        }
        let period = Duration::from_secs(interval_secs);

        let mut state = self.state.lock().await;
        if let SchedulerState::Running { interval, cancel } = &*state {
            debug!(
                old_interval_secs = interval.as_secs(),
                new_interval_secs = interval_secs,
                "Replacing running monitor loop"
            );
            cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let timeout = effective_timeout(self.ctx.check_timeout, period);
        tokio::spawn(monitor_loop(
            Arc::clone(&self.ctx),
            period,
            timeout,
            cancel.clone(),
        ));
        *state = SchedulerState::Running {
            interval: period,
            cancel,
        };

        info!(
            interval_secs,
            check_timeout_ms = timeout.as_millis() as u64,
            "Monitoring started"
        );
        self.ctx
            .events
            .publish(MonitorEvent::MonitoringStarted { interval_secs });
        Ok(())
    }

    /// 定期監視を停止（停止済みなら何もしない）
    ///
    /// 新しいtickは発生しなくなるが、実行中のチェックは完了まで続き記録される。
    /// 実行中だった場合は`true`を返す。
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SchedulerState::Stopped) {
            SchedulerState::Running { cancel, .. } => {
                cancel.cancel();
                info!("Monitoring stopped");
                self.ctx.events.publish(MonitorEvent::MonitoringStopped);
                true
            }
            SchedulerState::Stopped => false,
        }
    }

    /// 実行中か
    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, SchedulerState::Running { .. })
    }

    /// 実行中の監視間隔
    pub async fn interval(&self) -> Option<Duration> {
        match &*self.state.lock().await {
            SchedulerState::Running { interval, .. } => Some(*interval),
            SchedulerState::Stopped => None,
        }
    }

    /// 1回分のtickを即座に実行し、全チェックの完了を待つ
    pub async fn run_tick(&self) -> TickReport {
        let timeout = match self.interval().await {
            Some(period) => effective_timeout(self.ctx.check_timeout, period),
            None => self.ctx.check_timeout,
        };
        run_tick(&self.ctx, timeout).await
    }
}

/// 間隔以上のタイムアウトは間隔の3/4に切り詰める
fn effective_timeout(check_timeout: Duration, period: Duration) -> Duration {
    if check_timeout < period {
        return check_timeout;
    }
    (period * 3 / 4).max(Duration::from_millis(1))
}

async fn monitor_loop(
    ctx: Arc<CheckContext>,
    period: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(interval_secs = period.as_secs(), "Monitor loop cancelled");
                break;
            }

            _ = timer.tick() => {
                run_tick(&ctx, timeout).await;
            }
        }
    }
}

async fn run_tick(ctx: &Arc<CheckContext>, timeout: Duration) -> TickReport {
    let endpoints = ctx.endpoints.list().await;
    let mut report = TickReport::default();

    if endpoints.is_empty() {
        debug!("No endpoints to check");
        return report;
    }

    let permits = endpoints.len().min(ctx.max_concurrent_checks);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut handles = Vec::with_capacity(endpoints.len());

    for endpoint in endpoints {
        let Some(guard) = InFlightGuard::acquire(ctx, &endpoint.id) else {
            debug!(endpoint_id = %endpoint.id, "Previous check still in flight, skipping");
            report.skipped += 1;
            continue;
        };

        let ctx = Arc::clone(ctx);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _guard = guard;
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Check semaphore closed");
                    return;
                }
            };
            check_endpoint(&ctx, endpoint, timeout).await;
        }));
    }

    report.checked = handles.len();
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Health check task join error: {}", e);
        }
    }

    debug!(
        checked = report.checked,
        skipped = report.skipped,
        "Health check tick completed"
    );
    report
}

async fn check_endpoint(ctx: &CheckContext, endpoint: MonitoredEndpoint, timeout: Duration) {
    let result = ctx.executor.execute(&endpoint.spec, timeout).await;

    ctx.history
        .record(
            endpoint.spec.clone(),
            &result,
            RecordOrigin::ScheduledCheck {
                endpoint_id: endpoint.id.clone(),
            },
        )
        .await;

    // チェック中に登録解除・再登録されたエンドポイントのエントリは上書きしない
    let Some(registration) = ctx.endpoints.lock_current(&endpoint).await else {
        debug!(
            endpoint_id = %endpoint.id,
            "Endpoint removed or replaced during check, skipping health update"
        );
        return;
    };
    let new_status = HealthStatus::classify(&result);
    let old_status = ctx.health.update(&endpoint.id, &result).await;
    drop(registration);

    ctx.events.publish(MonitorEvent::CheckCompleted {
        endpoint_id: endpoint.id.clone(),
        status: new_status,
        response_time_ms: result.response_time_ms,
        http_status_code: result.http_status_code,
    });

    if old_status != new_status {
        match new_status {
            HealthStatus::Up => info!(
                endpoint_id = %endpoint.id,
                old_status = %old_status,
                response_time_ms = result.response_time_ms,
                "Endpoint is up"
            ),
            _ => warn!(
                endpoint_id = %endpoint.id,
                old_status = %old_status,
                new_status = %new_status,
                http_status = ?result.http_status_code,
                error = ?result.error,
                "Endpoint health degraded"
            ),
        }
        ctx.events.publish(MonitorEvent::HealthStatusChanged {
            endpoint_id: endpoint.id,
            old_status,
            new_status,
        });
    }
}
