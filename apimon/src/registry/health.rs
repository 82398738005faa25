//! ヘルスレジストリ
//!
//! エンドポイントごとの最新チェック結果を保持する。
//! エントリは常に直近1回の結果で上書きされ、過去の結果とはマージしない。

use crate::types::health::{HealthEntry, HealthStatus};
use crate::types::response::ResponseResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// ヘルスレジストリ
#[derive(Clone, Default)]
pub struct HealthRegistry {
    entries: Arc<RwLock<HashMap<String, HealthEntry>>>,
}

impl HealthRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// `unknown`状態のエントリを登録（既存のエントリはリセットされる）
    pub async fn register(&self, endpoint_id: &str) {
        self.entries
            .write()
            .await
            .insert(endpoint_id.to_string(), HealthEntry::unknown(endpoint_id));
    }

    /// チェック結果でエントリを上書きし、更新前のステータスを返す
    ///
    /// 未登録のIDは`unknown`から遷移したものとして扱う。
    pub async fn update(&self, endpoint_id: &str, result: &ResponseResult) -> HealthStatus {
        let entry = HealthEntry::from_result(endpoint_id, result);
        let new_status = entry.status;
        let old_status = self
            .entries
            .write()
            .await
            .insert(endpoint_id.to_string(), entry)
            .map(|previous| previous.status)
            .unwrap_or_default();

        debug!(
            endpoint_id = %endpoint_id,
            old_status = %old_status,
            new_status = %new_status,
            "Health entry updated"
        );
        old_status
    }

    /// エントリを取得
    pub async fn get(&self, endpoint_id: &str) -> Option<HealthEntry> {
        self.entries.read().await.get(endpoint_id).cloned()
    }

    /// 全エントリのスナップショット
    pub async fn all(&self) -> HashMap<String, HealthEntry> {
        self.entries.read().await.clone()
    }

    /// エントリを削除
    pub async fn remove(&self, endpoint_id: &str) -> Option<HealthEntry> {
        self.entries.write().await.remove(endpoint_id)
    }

    /// 指定ステータスのエントリをID順で取得
    pub async fn list_by_status(&self, status: HealthStatus) -> Vec<HealthEntry> {
        let mut entries: Vec<HealthEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
        entries
    }

    /// 直近の応答時間が閾値を超えたエントリを遅い順で取得
    pub async fn list_slow(&self, threshold_ms: u64) -> Vec<HealthEntry> {
        let mut entries: Vec<HealthEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.last_response_time_ms.is_some_and(|ms| ms > threshold_ms))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.last_response_time_ms
                .cmp(&a.last_response_time_ms)
                .then_with(|| a.endpoint_id.cmp(&b.endpoint_id))
        });
        entries
    }

    /// 登録数
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 空か
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
