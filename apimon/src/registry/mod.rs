//! 監視対象の登録管理
//!
//! 監視対象エンドポイントの定義（`EndpointRegistry`）と、
//! 各エンドポイントの現在のヘルス状態（`HealthRegistry`）をメモリ内で管理する。

pub mod endpoints;
pub mod health;

pub use endpoints::{EndpointRegistry, MonitoredEndpoint, RegistrationGuard};
pub use health::HealthRegistry;
