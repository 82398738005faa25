//! apimon
//!
//! HTTP APIの手動テストと定期ヘルス監視を行うエンジン

#![warn(missing_docs)]

/// 共通定義（エラー型）
pub mod common;

/// 型定義
pub mod types;

/// 設定管理（環境変数ヘルパー・エンドポイント定義ファイル）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// リクエスト実行器
pub mod executor;

/// リクエスト履歴
pub mod history;

/// エンドポイント・ヘルス状態の登録管理
pub mod registry;

/// 監視イベントバス
pub mod events;

/// 定期ヘルスチェックと統計
pub mod health;

/// 監視エンジン（外部向けインターフェース）
pub mod engine;

/// CLI
pub mod cli;

pub use common::error::{MonitorError, MonitorResult, ValidationError};
pub use config::MonitorConfig;
pub use engine::{ApiMonitor, HealthSnapshot};
pub use events::MonitorEvent;
