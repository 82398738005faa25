//! エンドポイントレジストリ
//!
//! エンドポイントID → チェック用リクエストの対応表

use crate::common::error::ValidationError;
use crate::types::request::RequestSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

type EndpointMap = HashMap<String, MonitoredEndpoint>;

/// 監視対象エンドポイント
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitoredEndpoint {
    /// エンドポイントID
    pub id: String,
    /// 定期チェックで送信するリクエスト
    pub spec: RequestSpec,
    /// 登録時刻
    pub registered_at: DateTime<Utc>,
    /// 登録世代（登録のたびに単調増加）
    #[serde(skip)]
    pub generation: u64,
}

/// レジストリの読み取りロックを保持するガード
///
/// 生存中はすべての登録・置き換え・削除がブロックされる。
pub struct RegistrationGuard<'a> {
    _endpoints: RwLockReadGuard<'a, EndpointMap>,
}

/// エンドポイントレジストリ
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Arc<RwLock<EndpointMap>>,
    next_generation: Arc<AtomicU64>,
}

impl EndpointRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// エンドポイントを登録
    ///
    /// 同じIDが登録済みなら置き換え、以前の定義を返す。
    pub async fn register(
        &self,
        id: &str,
        spec: RequestSpec,
    ) -> Result<Option<MonitoredEndpoint>, ValidationError> {
        let (previous, _guard) = self.register_guarded(id, spec).await?;
        Ok(previous)
    }

    /// エンドポイントを登録し、読み取りロックを保持したまま返す
    ///
    /// ガードの生存中は、同じエンドポイントの進行中チェックが
    /// ヘルス状態を書き込めない。
    pub async fn register_guarded(
        &self,
        id: &str,
        spec: RequestSpec,
    ) -> Result<(Option<MonitoredEndpoint>, RegistrationGuard<'_>), ValidationError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyEndpointId);
        }

        let endpoint = MonitoredEndpoint {
            id: id.to_string(),
            spec,
            registered_at: Utc::now(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
        };
        let mut endpoints = self.endpoints.write().await;
        let previous = endpoints.insert(id.to_string(), endpoint);

        if previous.is_some() {
            debug!(endpoint_id = %id, "Endpoint definition replaced");
        } else {
            info!(endpoint_id = %id, "Endpoint registered");
        }
        Ok((
            previous,
            RegistrationGuard {
                _endpoints: endpoints.downgrade(),
            },
        ))
    }

    /// 指定の登録がまだ有効なら、読み取りロックを保持したガードを返す
    ///
    /// 削除済み、または別の定義で置き換えられていれば`None`。
    pub async fn lock_current(
        &self,
        endpoint: &MonitoredEndpoint,
    ) -> Option<RegistrationGuard<'_>> {
        let endpoints = self.endpoints.read().await;
        let current = endpoints
            .get(&endpoint.id)
            .is_some_and(|e| e.generation == endpoint.generation);
        if !current {
            return None;
        }
        Some(RegistrationGuard {
            _endpoints: endpoints,
        })
    }

    /// エンドポイントを削除
    pub async fn remove(&self, id: &str) -> Option<MonitoredEndpoint> {
        let removed = self.endpoints.write().await.remove(id);
        if removed.is_some() {
            info!(endpoint_id = %id, "Endpoint unregistered");
        }
        removed
    }

    /// エンドポイントを取得
    pub async fn get(&self, id: &str) -> Option<MonitoredEndpoint> {
        self.endpoints.read().await.get(id).cloned()
    }

    /// 登録済みか
    pub async fn contains(&self, id: &str) -> bool {
        self.endpoints.read().await.contains_key(id)
    }

    /// すべてのエンドポイントをID順で取得
    pub async fn list(&self) -> Vec<MonitoredEndpoint> {
        let mut endpoints: Vec<MonitoredEndpoint> =
            self.endpoints.read().await.values().cloned().collect();
        endpoints.sort_by(|a, b| a.id.cmp(&b.id));
        endpoints
    }

    /// 登録数
    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// 空か
    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }
}
