//! レスポンス結果型
//!
//! 1回のリクエスト実行結果。実行ごとに1度だけ生成され、以後変更されない。

use super::request::HttpMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 保存時に切り詰めたボディへ付与する接尾辞
pub const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// 実行結果の状態
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// HTTPレスポンスを受信した（ステータスコードは問わない）
    Success,
    /// ネットワークレベルの失敗
    Error,
}

impl ResultStatus {
    /// 文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ネットワークエラーの分類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    /// タイムアウト
    Timeout,
    /// 接続拒否
    ConnectionRefused,
    /// TLSハンドシェイク・証明書エラー
    Tls,
    /// その他（DNS解決失敗を含む）
    Unknown,
}

impl NetworkErrorKind {
    /// `ResponseResult::error`に設定する短い分類メッセージ
    pub fn message(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection refused",
            Self::Tls => "tls error",
            Self::Unknown => "unknown network error",
        }
    }
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// リクエスト実行結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseResult {
    /// 実行したHTTPメソッド
    pub method: HttpMethod,
    /// 実際の送信先URL（クエリパラメータ適用後）
    pub url: String,
    /// 実行結果の状態
    pub status: ResultStatus,
    /// HTTPステータスコード（ネットワーク失敗時はなし）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status_code: Option<u16>,
    /// 呼び出し開始から完了までの経過時間（ミリ秒）
    pub response_time_ms: u64,
    /// レスポンスヘッダー
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// レスポンスボディ
    #[serde(default)]
    pub body: String,
    /// ボディが上限で切り詰められたか
    #[serde(default)]
    pub body_truncated: bool,
    /// 分類済みエラーメッセージ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 下位レイヤーのエラー詳細
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// 完了時刻
    pub timestamp: DateTime<Utc>,
}

impl ResponseResult {
    /// HTTPレスポンスを受信した結果を作成
    pub fn received(
        method: HttpMethod,
        url: String,
        http_status_code: u16,
        response_time_ms: u64,
        headers: BTreeMap<String, String>,
        body: String,
        body_truncated: bool,
    ) -> Self {
        Self {
            method,
            url,
            status: ResultStatus::Success,
            http_status_code: Some(http_status_code),
            response_time_ms,
            headers,
            body,
            body_truncated,
            error: None,
            error_detail: None,
            timestamp: Utc::now(),
        }
    }

    /// ネットワーク失敗の結果を作成
    pub fn network_error(
        method: HttpMethod,
        url: String,
        kind: NetworkErrorKind,
        detail: Option<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            method,
            url,
            status: ResultStatus::Error,
            http_status_code: None,
            response_time_ms,
            headers: BTreeMap::new(),
            body: String::new(),
            body_truncated: false,
            error: Some(kind.message().to_string()),
            error_detail: detail,
            timestamp: Utc::now(),
        }
    }

    /// HTTPレスポンスを受信したか
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// 履歴保存用にボディを切り詰めたコピーを返す
    pub fn truncated_for_history(&self, max_chars: usize) -> Self {
        let mut copy = self.clone();
        if let Some((cut, _)) = copy.body.char_indices().nth(max_chars) {
            copy.body.truncate(cut);
            copy.body.push_str(TRUNCATION_SUFFIX);
            copy.body_truncated = true;
        }
        copy
    }
}
