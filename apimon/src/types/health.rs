//! ヘルス状態型定義
//!
//! エンドポイントごとの現在状態と、集計結果の型

use super::response::{ResponseResult, ResultStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// エンドポイントのヘルス状態
///
/// 表示用のアイコン・色などはすべてこの列挙型から導出する。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// 初期状態（未チェック）
    #[default]
    Unknown,
    /// 稼働中（HTTP 200-399）
    Up,
    /// 停止中（HTTP 400以上）
    Down,
    /// ネットワークエラー
    Error,
}

impl HealthStatus {
    /// 実行結果からステータスを判定
    pub fn classify(result: &ResponseResult) -> Self {
        match (result.status, result.http_status_code) {
            (ResultStatus::Error, _) => Self::Error,
            (ResultStatus::Success, Some(code)) if (200..=399).contains(&code) => Self::Up,
            (ResultStatus::Success, Some(code)) if code >= 400 => Self::Down,
            // 1xxなど判定対象外のコード、またはコードなし
            (ResultStatus::Success, _) => Self::Unknown,
        }
    }

    /// HealthStatusを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Up => "up",
            Self::Down => "down",
            Self::Error => "error",
        }
    }

    /// CLI表示用の記号
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Unknown => "?",
            Self::Up => "✔",
            Self::Down => "✘",
            Self::Error => "!",
        }
    }
}

impl FromStr for HealthStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "up" => Self::Up,
            "down" => Self::Down,
            "error" => Self::Error,
            _ => Self::Unknown,
        })
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// エンドポイントの現在のヘルス情報
///
/// 直近1回のチェック結果のみから導出され、チェックごとに上書きされる。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthEntry {
    /// エンドポイントID
    pub endpoint_id: String,
    /// 現在の状態
    pub status: HealthStatus,
    /// 直近の応答時間（ミリ秒）
    pub last_response_time_ms: Option<u64>,
    /// 直近のHTTPステータスコード
    pub last_http_status_code: Option<u16>,
    /// 直近のエラーメッセージ
    pub last_error: Option<String>,
    /// 最終チェック時刻
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl HealthEntry {
    /// 未チェック状態のエントリを作成
    pub fn unknown(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: HealthStatus::Unknown,
            last_response_time_ms: None,
            last_http_status_code: None,
            last_error: None,
            last_checked_at: None,
        }
    }

    /// 実行結果からエントリを作成
    pub fn from_result(endpoint_id: impl Into<String>, result: &ResponseResult) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: HealthStatus::classify(result),
            last_response_time_ms: Some(result.response_time_ms),
            last_http_status_code: result.http_status_code,
            last_error: result.error.clone(),
            last_checked_at: Some(result.timestamp),
        }
    }
}

/// 監視全体の集計値
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    /// 登録エンドポイント数
    pub total: usize,
    /// up件数
    pub up: usize,
    /// down件数
    pub down: usize,
    /// error件数
    pub error: usize,
    /// unknown件数
    pub unknown: usize,
    /// 稼働率（%）: up / unknown以外 × 100
    pub uptime_percent: f64,
    /// 平均応答時間（ミリ秒）
    pub avg_response_time_ms: f64,
    /// 平均応答時間の算出に使った履歴件数
    pub sample_size: usize,
}

/// エンドポイント単位の集計値（履歴ウィンドウ内の定期チェックから算出）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointSummary {
    /// エンドポイントID
    pub endpoint_id: String,
    /// 集計対象のチェック回数
    pub checks: usize,
    /// up判定の回数
    pub up_checks: usize,
    /// 稼働率（%）
    pub uptime_percent: f64,
    /// 平均応答時間（ミリ秒）
    pub avg_response_time_ms: f64,
}
