//! 実行履歴型定義

use super::request::RequestSpec;
use super::response::ResponseResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 履歴レコードの発生元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecordOrigin {
    /// 手動テスト
    ManualTest,
    /// 定期ヘルスチェック
    ScheduledCheck {
        /// チェック対象のエンドポイントID
        endpoint_id: String,
    },
}

impl RecordOrigin {
    /// 定期チェック由来か
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::ScheduledCheck { .. })
    }

    /// 定期チェック由来ならエンドポイントIDを返す
    pub fn endpoint_id(&self) -> Option<&str> {
        match self {
            Self::ManualTest => None,
            Self::ScheduledCheck { endpoint_id } => Some(endpoint_id),
        }
    }

    /// 文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualTest => "manual-test",
            Self::ScheduledCheck { .. } => "scheduled-check",
        }
    }
}

/// 履歴レコード
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    /// レコードID
    pub id: Uuid,
    /// 実行したリクエスト
    pub request: RequestSpec,
    /// 実行結果
    pub response: ResponseResult,
    /// 発生元
    pub origin: RecordOrigin,
}

impl HistoryRecord {
    /// 新しいレコードを作成
    pub fn new(request: RequestSpec, response: ResponseResult, origin: RecordOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            response,
            origin,
        }
    }
}

/// 履歴の絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// 定期チェックのみ（Some(true)）/ 手動テストのみ（Some(false)）
    pub scheduled: Option<bool>,
    /// エンドポイントID
    pub endpoint_id: Option<String>,
    /// URLに含まれる文字列
    pub url_contains: Option<String>,
    /// 最大件数（None は容量まで）
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// 条件に一致するか
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if let Some(scheduled) = self.scheduled {
            if record.origin.is_scheduled() != scheduled {
                return false;
            }
        }
        if let Some(ref id) = self.endpoint_id {
            if record.origin.endpoint_id() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(ref needle) = self.url_contains {
            if !record.response.url.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

/// 手動テストの集計値
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestStats {
    /// 総件数
    pub total: usize,
    /// HTTPレスポンスを受信した件数
    pub successful: usize,
    /// ネットワーク失敗件数
    pub failed: usize,
    /// 成功率（%）
    pub success_rate: f64,
    /// 平均応答時間（ミリ秒）
    pub avg_response_time_ms: f64,
}
