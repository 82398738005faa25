//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! # エラー分類
//!
//! - 検証エラー（[`ValidationError`]）: ネットワーク呼び出し前に同期的に返す
//! - ネットワークエラー: `ResponseResult`の`status = error`として表現し、例外にはしない
//! - アプリケーションエラー（4xx/5xx）: 実行器レベルでは成功扱い

use thiserror::Error;

/// Validation error raised before any network call is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// URL is empty
    #[error("URL must not be empty")]
    EmptyUrl,

    /// URL could not be parsed as an absolute URI
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// URL scheme is not http/https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// HTTP method outside GET/POST/PUT/PATCH/DELETE
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Auth kind requires a credential but none was supplied
    #[error("Missing credential for {0} authentication")]
    MissingCredential(&'static str),

    /// Header name or value is not valid for HTTP
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Reason for rejection
        reason: String,
    },

    /// Query parameter key is empty
    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),

    /// Endpoint identifier is empty
    #[error("Endpoint id must not be empty")]
    EmptyEndpointId,

    /// Monitoring interval must be positive
    #[error("Monitoring interval must be greater than zero")]
    InvalidInterval,
}

/// apimon error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Endpoint not registered
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MonitorError {
    /// 検証エラーかどうか
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for MonitorError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// apimon Result type alias
pub type MonitorResult<T> = Result<T, MonitorError>;
