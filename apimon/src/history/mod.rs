//! リクエスト履歴
//!
//! 手動テストと定期チェックの実行結果を固定容量のリングバッファに保持する。
//! 容量を超えると最も古いレコードから破棄され、参照は常に新しい順。

use crate::types::history::{HistoryFilter, HistoryRecord, RecordOrigin, TestStats};
use crate::types::request::RequestSpec;
use crate::types::response::ResponseResult;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// 容量を保ったまま末尾に追加する
trait BoundedPush<T> {
    fn push_bounded(&mut self, value: T, max_size: usize);
}

impl<T> BoundedPush<T> for VecDeque<T> {
    #[inline]
    fn push_bounded(&mut self, value: T, max_size: usize) {
        while self.len() >= max_size {
            self.pop_front();
        }
        self.push_back(value);
    }
}

/// 履歴ストア
#[derive(Clone)]
pub struct HistoryStore {
    records: Arc<RwLock<VecDeque<HistoryRecord>>>,
    capacity: usize,
    body_chars: usize,
}

impl HistoryStore {
    /// 容量と保存時のボディ文字数上限を指定して作成（容量は最低1）
    pub fn new(capacity: usize, body_chars: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            body_chars,
        }
    }

    /// 実行結果を記録し、保存したレコードを返す
    ///
    /// レスポンスボディは`body_chars`文字に切り詰めて保存する。
    pub async fn record(
        &self,
        request: RequestSpec,
        response: &ResponseResult,
        origin: RecordOrigin,
    ) -> HistoryRecord {
        let record = HistoryRecord::new(
            request,
            response.truncated_for_history(self.body_chars),
            origin,
        );

        let mut records = self.records.write().await;
        records.push_bounded(record.clone(), self.capacity);
        debug!(
            record_id = %record.id,
            origin = record.origin.as_str(),
            len = records.len(),
            "History record stored"
        );

        record
    }

    /// 新しい順に最大`limit`件を返す（`limit`は容量で頭打ち）
    pub async fn list(&self, limit: usize) -> Vec<HistoryRecord> {
        let limit = limit.min(self.capacity);
        self.records
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// 条件に一致するレコードを新しい順に返す
    pub async fn filter(&self, filter: &HistoryFilter) -> Vec<HistoryRecord> {
        let limit = filter.limit.unwrap_or(self.capacity).min(self.capacity);
        self.records
            .read()
            .await
            .iter()
            .rev()
            .filter(|record| filter.matches(record))
            .take(limit)
            .cloned()
            .collect()
    }

    /// 直近`limit`件の定期チェック結果を新しい順に返す
    pub async fn recent_scheduled(&self, limit: usize) -> Vec<HistoryRecord> {
        self.filter(&HistoryFilter {
            scheduled: Some(true),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }

    /// 全レコードを削除
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    /// 保存件数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// 空か
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 手動テストの集計
    pub async fn test_stats(&self) -> TestStats {
        let records = self.records.read().await;
        let manual: Vec<&HistoryRecord> = records
            .iter()
            .filter(|record| !record.origin.is_scheduled())
            .collect();

        let total = manual.len();
        if total == 0 {
            return TestStats::default();
        }

        let successful = manual.iter().filter(|r| r.response.is_success()).count();
        let total_time: u64 = manual.iter().map(|r| r.response.response_time_ms).sum();

        TestStats {
            total,
            successful,
            failed: total - successful,
            success_rate: successful as f64 / total as f64 * 100.0,
            avg_response_time_ms: total_time as f64 / total as f64,
        }
    }
}
