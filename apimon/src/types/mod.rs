//! 型定義

/// ヘルス状態・集計
pub mod health;
/// 実行履歴
pub mod history;
/// リクエスト定義
pub mod request;
/// レスポンス結果
pub mod response;

pub use health::{EndpointSummary, HealthEntry, HealthStatus, Stats};
pub use history::{HistoryFilter, HistoryRecord, RecordOrigin, TestStats};
pub use request::{AuthConfig, HttpMethod, RequestBody, RequestSpec, RequestSpecBuilder};
pub use response::{NetworkErrorKind, ResponseResult, ResultStatus};
