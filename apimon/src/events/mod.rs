//! 監視イベントバス
//!
//! チェック完了・状態変化・監視の開始/停止などのイベントを
//! CLIなどの購読者にブロードキャストするための基盤

use crate::types::health::HealthStatus;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// イベントバスのチャネル容量
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 監視イベント
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum MonitorEvent {
    /// 定期監視の開始
    MonitoringStarted {
        /// チェック間隔（秒）
        interval_secs: u64,
    },
    /// 定期監視の停止
    MonitoringStopped,
    /// 1エンドポイントのチェック完了
    CheckCompleted {
        /// エンドポイントID
        endpoint_id: String,
        /// 判定結果
        status: HealthStatus,
        /// 応答時間（ミリ秒）
        response_time_ms: u64,
        /// HTTPステータスコード
        http_status_code: Option<u16>,
    },
    /// エンドポイントの状態変化
    HealthStatusChanged {
        /// エンドポイントID
        endpoint_id: String,
        /// 旧ステータス
        old_status: HealthStatus,
        /// 新ステータス
        new_status: HealthStatus,
    },
}

/// 監視イベントバス
#[derive(Clone)]
pub struct MonitorEventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl Default for MonitorEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorEventBus {
    /// 新しいイベントバスを作成
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// イベントバスを購読
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// イベントを発行
    ///
    /// 購読者がいない場合でもエラーにはならない
    pub fn publish(&self, event: MonitorEvent) {
        let _ = self.sender.send(event);
    }

    /// 現在の購読者数を取得
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Arc でラップされたイベントバス
pub type SharedEventBus = Arc<MonitorEventBus>;

/// 共有可能なイベントバスを作成
pub fn create_shared_event_bus() -> SharedEventBus {
    Arc::new(MonitorEventBus::new())
}
