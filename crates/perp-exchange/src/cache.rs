//! 주문 상태 캐시.
//!
//! 거래소 주문 ID → (계약 심볼, 마지막 주문 스냅샷, 갱신 시각) 매핑입니다.
//! 조회/취소 엔드포인트가 요구하지만 주문 ID에는 들어 있지 않은 계약 심볼을
//! 복구하고, 실시간 조회가 실패했을 때 마지막으로 알려진 상태를 제공합니다.
//!
//! 정리(sweep) 정책은 TTL 우선, 크기 차선입니다. 먼저 `ttl`보다 오래된 항목을
//! 지우고, 그래도 `max_entries`를 넘으면 갱신 시각이 오래된 순으로 지웁니다.
//! 엄밀한 LRU가 아니며, 오래된 스냅샷(잘못된 계약, 이미 닫힌 주문)을 남기는
//! 것을 용량 초과보다 나쁜 실패로 봅니다.

use crate::clock::{LocalClock, SystemClock};
use perp_core::{CacheSettings, OrderResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// 주문 캐시 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCacheConfig {
    /// 최대 항목 수
    pub max_entries: usize,
    /// 항목 유효 시간
    pub ttl: Duration,
}

impl Default for OrderCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl From<&CacheSettings> for OrderCacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            ttl: Duration::from_secs(settings.ttl_secs),
        }
    }
}

/// 캐시 항목.
#[derive(Debug, Clone)]
pub struct OrderCacheEntry {
    /// 계약 심볼
    pub contract: String,
    /// 마지막으로 알려진 주문 스냅샷
    pub snapshot: OrderResult,
    /// 삽입/갱신 시각 (밀리초)
    pub updated_at_ms: i64,
}

/// 주문 상태 캐시.
///
/// 삽입과 정리는 하나의 임계 구역에서 일어나므로 동시 호출 사이에서도
/// 크기/TTL 불변식이 유지됩니다.
pub struct OrderCache {
    entries: Mutex<HashMap<String, OrderCacheEntry>>,
    config: OrderCacheConfig,
    clock: Arc<dyn LocalClock>,
}

impl std::fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for OrderCache {
    fn default() -> Self {
        Self::new(OrderCacheConfig::default())
    }
}

impl OrderCache {
    /// 시스템 시계를 사용하는 캐시를 생성합니다.
    pub fn new(config: OrderCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// 시계를 주입해 캐시를 생성합니다.
    pub fn with_clock(config: OrderCacheConfig, clock: Arc<dyn LocalClock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, OrderCacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &OrderCacheEntry, now_ms: i64) -> bool {
        now_ms - entry.updated_at_ms > self.config.ttl.as_millis() as i64
    }

    /// 주문을 기록(또는 갱신)하고 정리합니다.
    pub fn remember(&self, order_id: &str, contract: &str, snapshot: OrderResult) {
        let now_ms = self.clock.now_ms();
        let mut entries = self.lock();
        entries.insert(
            order_id.to_string(),
            OrderCacheEntry {
                contract: contract.to_string(),
                snapshot,
                updated_at_ms: now_ms,
            },
        );
        self.sweep_locked(&mut entries, now_ms);
    }

    /// 주문 항목을 조회합니다. 만료된 항목은 없는 것으로 취급합니다.
    pub fn lookup(&self, order_id: &str) -> Option<OrderCacheEntry> {
        let now_ms = self.clock.now_ms();
        let entries = self.lock();
        entries
            .get(order_id)
            .filter(|entry| !self.is_expired(entry, now_ms))
            .cloned()
    }

    /// 주문의 계약 심볼을 조회합니다.
    pub fn contract_of(&self, order_id: &str) -> Option<String> {
        self.lookup(order_id).map(|entry| entry.contract)
    }

    /// 주문 항목을 제거합니다.
    pub fn forget(&self, order_id: &str) -> Option<OrderCacheEntry> {
        self.lock().remove(order_id)
    }

    /// 만료 항목과 초과 항목을 정리하고 제거된 수를 반환합니다.
    pub fn sweep(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut entries = self.lock();
        self.sweep_locked(&mut entries, now_ms)
    }

    fn sweep_locked(&self, entries: &mut HashMap<String, OrderCacheEntry>, now_ms: i64) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now_ms));
        let expired = before - entries.len();

        let overflow = entries.len().saturating_sub(self.config.max_entries);
        if overflow > 0 {
            let mut by_age: Vec<(i64, String)> = entries
                .iter()
                .map(|(id, entry)| (entry.updated_at_ms, id.clone()))
                .collect();
            by_age.sort_unstable();
            for (_, id) in by_age.into_iter().take(overflow) {
                entries.remove(&id);
            }
        }

        if expired + overflow > 0 {
            debug!(expired, evicted = overflow, remaining = entries.len(), "Order cache swept");
        }
        expired + overflow
    }

    /// 현재 항목 수 (만료 항목 포함, 다음 정리 전까지).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 캐시가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
