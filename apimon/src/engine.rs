//! 監視エンジン
//!
//! 実行器・履歴・レジストリ・スケジューラー・集計を1つにまとめた外部向けインターフェース

use crate::common::error::{MonitorError, MonitorResult, ValidationError};
use crate::config::MonitorConfig;
use crate::events::{create_shared_event_bus, MonitorEvent, SharedEventBus};
use crate::executor::{content_type_variants, RequestExecutor, DEFAULT_CONTENT_TYPES};
use crate::health::{MonitorScheduler, StatsAggregator, TickReport};
use crate::history::HistoryStore;
use crate::registry::{EndpointRegistry, HealthRegistry};
use crate::types::health::{EndpointSummary, HealthEntry, HealthStatus, Stats};
use crate::types::history::{HistoryFilter, HistoryRecord, RecordOrigin, TestStats};
use crate::types::request::RequestSpec;
use crate::types::response::ResponseResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::info;

/// 全エンドポイントのヘルス状態と統計のスナップショット
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// 取得時刻
    pub generated_at: DateTime<Utc>,
    /// 監視中か
    pub monitoring: bool,
    /// 統計
    pub stats: Stats,
    /// エンドポイントID順のヘルス状態
    pub endpoints: Vec<HealthEntry>,
}

/// API監視エンジン
#[derive(Clone)]
pub struct ApiMonitor {
    config: MonitorConfig,
    executor: RequestExecutor,
    history: HistoryStore,
    endpoints: EndpointRegistry,
    health: HealthRegistry,
    scheduler: MonitorScheduler,
    stats: StatsAggregator,
    events: SharedEventBus,
}

impl ApiMonitor {
    /// 設定からエンジンを作成
    pub fn new(config: MonitorConfig) -> MonitorResult<Self> {
        let executor = RequestExecutor::new(&config)?;
        Ok(Self::with_executor(config, executor))
    }

    /// 既存の実行器からエンジンを作成
    pub fn with_executor(config: MonitorConfig, executor: RequestExecutor) -> Self {
        let history = HistoryStore::new(config.history_capacity, config.history_body_chars);
        let endpoints = EndpointRegistry::new();
        let health = HealthRegistry::new();
        let events = create_shared_event_bus();
        let scheduler = MonitorScheduler::new(
            endpoints.clone(),
            health.clone(),
            history.clone(),
            executor.clone(),
            events.clone(),
            config.check_timeout,
            config.max_concurrent_checks,
        );
        let stats = StatsAggregator::new(health.clone(), history.clone(), config.stats_sample_size);

        Self {
            config,
            executor,
            history,
            endpoints,
            health,
            scheduler,
            stats,
            events,
        }
    }

    /// 使用中の設定
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// 手動テストを実行して履歴に記録
    ///
    /// 返り値のボディは切り詰められない。
    pub async fn run_test(&self, spec: &RequestSpec) -> ResponseResult {
        let result = self
            .executor
            .execute(spec, self.config.request_timeout)
            .await;
        self.history
            .record(spec.clone(), &result, RecordOrigin::ManualTest)
            .await;
        result
    }

    /// GET/POST/PUT/PATCH/DELETEの順に実行し、それぞれ履歴に記録
    pub async fn run_multi_method_test(&self, spec: &RequestSpec) -> Vec<ResponseResult> {
        let results = self
            .executor
            .execute_all_methods(spec, self.config.request_timeout)
            .await;
        for result in &results {
            self.history
                .record(
                    spec.with_method(result.method),
                    result,
                    RecordOrigin::ManualTest,
                )
                .await;
        }
        results
    }

    /// Content-Typeごとに整形したボディでPOSTし、それぞれ履歴に記録
    ///
    /// `content_types`が空なら JSON・XML・テキストの3種を試す。
    pub async fn run_content_type_test(
        &self,
        spec: &RequestSpec,
        content_types: &[&str],
    ) -> Result<Vec<ResponseResult>, ValidationError> {
        let content_types = if content_types.is_empty() {
            &DEFAULT_CONTENT_TYPES[..]
        } else {
            content_types
        };
        let variants = content_type_variants(spec, content_types)?;
        let mut results = Vec::with_capacity(variants.len());
        for variant in variants {
            let result = self
                .executor
                .execute(&variant, self.config.request_timeout)
                .await;
            self.history
                .record(variant, &result, RecordOrigin::ManualTest)
                .await;
            results.push(result);
        }
        Ok(results)
    }

    /// 定期監視を開始（実行中なら間隔を置き換える）
    pub async fn start_monitoring(&self, interval_secs: u64) -> MonitorResult<()> {
        self.scheduler.start(interval_secs).await?;
        Ok(())
    }

    /// 定期監視を停止
    pub async fn stop_monitoring(&self) {
        self.scheduler.stop().await;
    }

    /// 監視中か
    pub async fn is_monitoring(&self) -> bool {
        self.scheduler.is_running().await
    }

    /// 全エンドポイントを即座に1回チェック
    pub async fn run_health_checks_now(&self) -> TickReport {
        self.scheduler.run_tick().await
    }

    /// エンドポイントを登録し、ヘルス状態を`unknown`にリセット
    pub async fn register_endpoint(&self, endpoint_id: &str, spec: RequestSpec) -> MonitorResult<()> {
        let endpoint_id = endpoint_id.trim();
        let (_, _registration) = self.endpoints.register_guarded(endpoint_id, spec).await?;
        self.health.register(endpoint_id).await;
        Ok(())
    }

    /// エンドポイントの登録を解除
    pub async fn unregister_endpoint(&self, endpoint_id: &str) -> MonitorResult<()> {
        if self.endpoints.remove(endpoint_id).await.is_none() {
            return Err(MonitorError::EndpointNotFound(endpoint_id.to_string()));
        }
        self.health.remove(endpoint_id).await;
        Ok(())
    }

    /// 1エンドポイントのヘルス状態
    pub async fn get_health(&self, endpoint_id: &str) -> Option<HealthEntry> {
        self.health.get(endpoint_id).await
    }

    /// 全エンドポイントのヘルス状態
    pub async fn get_all_health(&self) -> HashMap<String, HealthEntry> {
        self.health.all().await
    }

    /// 指定ステータスのエンドポイント
    pub async fn get_health_by_status(&self, status: HealthStatus) -> Vec<HealthEntry> {
        self.health.list_by_status(status).await
    }

    /// 応答時間が閾値（省略時は設定値）を超えたエンドポイント
    pub async fn get_slow_endpoints(&self, threshold_ms: Option<u64>) -> Vec<HealthEntry> {
        self.health
            .list_slow(threshold_ms.unwrap_or(self.config.slow_threshold_ms))
            .await
    }

    /// 新しい順の履歴
    pub async fn get_history(&self, limit: usize) -> Vec<HistoryRecord> {
        self.history.list(limit).await
    }

    /// 条件付きの履歴
    pub async fn filter_history(&self, filter: &HistoryFilter) -> Vec<HistoryRecord> {
        self.history.filter(filter).await
    }

    /// 履歴を全削除
    pub async fn clear_history(&self) {
        self.history.clear().await;
        info!("History cleared");
    }

    /// 監視統計
    pub async fn get_stats(&self) -> Stats {
        self.stats.summarize().await
    }

    /// 1エンドポイントの集計
    pub async fn get_endpoint_summary(&self, endpoint_id: &str) -> MonitorResult<EndpointSummary> {
        if !self.endpoints.contains(endpoint_id).await {
            return Err(MonitorError::EndpointNotFound(endpoint_id.to_string()));
        }
        Ok(self.stats.endpoint_summary(endpoint_id).await)
    }

    /// 手動テストの集計
    pub async fn get_test_stats(&self) -> TestStats {
        self.history.test_stats().await
    }

    /// 監視イベントを購読
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// ヘルス状態と統計のスナップショット
    pub async fn health_snapshot(&self) -> HealthSnapshot {
        let mut endpoints: Vec<HealthEntry> = self.health.all().await.into_values().collect();
        endpoints.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));

        HealthSnapshot {
            generated_at: Utc::now(),
            monitoring: self.is_monitoring().await,
            stats: self.get_stats().await,
            endpoints,
        }
    }
}
