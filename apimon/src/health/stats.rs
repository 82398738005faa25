//! 監視統計の集計
//!
//! ステータス別件数と稼働率はヘルスレジストリから、
//! 平均応答時間は履歴中の直近の定期チェック結果から算出する。

use crate::history::HistoryStore;
use crate::registry::HealthRegistry;
use crate::types::health::{EndpointSummary, HealthStatus, Stats};
use crate::types::history::{HistoryFilter, HistoryRecord};

/// 統計アグリゲーター
#[derive(Clone)]
pub struct StatsAggregator {
    health: HealthRegistry,
    history: HistoryStore,
    sample_size: usize,
}

impl StatsAggregator {
    /// 新しいアグリゲーターを作成
    ///
    /// `sample_size`は平均応答時間に使う直近の定期チェック件数。
    pub fn new(health: HealthRegistry, history: HistoryStore, sample_size: usize) -> Self {
        Self {
            health,
            history,
            sample_size: sample_size.max(1),
        }
    }

    /// 全体の統計を算出
    pub async fn summarize(&self) -> Stats {
        let entries = self.health.all().await;
        let mut stats = Stats {
            total: entries.len(),
            ..Default::default()
        };

        for entry in entries.values() {
            match entry.status {
                HealthStatus::Up => stats.up += 1,
                HealthStatus::Down => stats.down += 1,
                HealthStatus::Error => stats.error += 1,
                HealthStatus::Unknown => stats.unknown += 1,
            }
        }

        let checked = stats.up + stats.down + stats.error;
        stats.uptime_percent = percent(stats.up, checked);

        let recent = self.history.recent_scheduled(self.sample_size).await;
        let (avg, used) = average_response_time(&recent);
        stats.avg_response_time_ms = avg;
        stats.sample_size = used;

        stats
    }

    /// 1エンドポイントの履歴ウィンドウ内の集計
    pub async fn endpoint_summary(&self, endpoint_id: &str) -> EndpointSummary {
        let records = self
            .history
            .filter(&HistoryFilter {
                scheduled: Some(true),
                endpoint_id: Some(endpoint_id.to_string()),
                ..Default::default()
            })
            .await;

        let up_checks = records
            .iter()
            .filter(|r| HealthStatus::classify(&r.response) == HealthStatus::Up)
            .count();
        let (avg, _) = average_response_time(&records);

        EndpointSummary {
            endpoint_id: endpoint_id.to_string(),
            checks: records.len(),
            up_checks,
            uptime_percent: percent(up_checks, records.len()),
            avg_response_time_ms: avg,
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

// ネットワーク失敗の経過時間はタイムアウト値に引きずられるため除外
fn average_response_time(records: &[HistoryRecord]) -> (f64, usize) {
    let times: Vec<u64> = records
        .iter()
        .filter(|r| r.response.is_success())
        .map(|r| r.response.response_time_ms)
        .collect();
    if times.is_empty() {
        return (0.0, 0);
    }
    let sum: u64 = times.iter().sum();
    (sum as f64 / times.len() as f64, times.len())
}
