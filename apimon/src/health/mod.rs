//! ヘルスチェックモニター
//!
//! 登録済みエンドポイントを定期的にチェックし、ヘルスレジストリと履歴を更新する。
//! 集計は`StatsAggregator`が必要時に算出する。

pub mod scheduler;
pub mod stats;

pub use scheduler::{MonitorScheduler, TickReport};
pub use stats::StatsAggregator;
