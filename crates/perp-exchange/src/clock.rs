//! 거래소 서버 시계 동기화.
//!
//! 로컬 시계와 거래소 서버 시계의 차이(offset)를 추정해 서명 요청의
//! 타임스탬프를 만듭니다. 상태는 `Unsynced`와 `Synced` 두 가지입니다.
//!
//! - 동기화 한 번은 `offset = (serverTime + rtt/2 - T1) - safety_margin` 입니다.
//!   안전 마진을 항상 빼므로 생성된 타임스탬프는 거래소 시계보다 앞서지 않습니다.
//! - 동시에 들어온 동기화 요청은 진행 중인 하나의 동기화에 합류하며
//!   네트워크 왕복은 한 번만 일어납니다.
//! - 동기화 실패 시 offset은 마지막 정상값으로 유지됩니다 (fail-stale).
//!   아직 한 번도 동기화되지 않았다면 호출자에게 에러를 돌려줍니다.

use crate::traits::ExchangeResult;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use perp_core::ClockSettings;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 로컬 시계 (밀리초 epoch).
pub trait LocalClock: Send + Sync {
    /// 현재 로컬 시각 (밀리초).
    fn now_ms(&self) -> i64;
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LocalClock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 수동으로 움직이는 시계.
///
/// 테스트에서 시간 경과(캐시 TTL, 재동기화 주기, 왕복 시간)를 결정적으로
/// 재현할 때 사용합니다.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// 주어진 시각에서 시작하는 시계를 생성합니다.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// 시계를 앞으로 움직입니다.
    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// 시계를 특정 시각으로 설정합니다.
    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl LocalClock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// 거래소 서버 시각 조회 (인증 불필요).
#[async_trait]
pub trait ServerTimeSource: Send + Sync {
    /// 서버 시각 (밀리초).
    async fn server_time_ms(&self) -> ExchangeResult<i64>;
}

/// 시계 동기화 설정.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// 안전 마진 (밀리초)
    pub safety_margin_ms: i64,
    /// 재동기화 주기
    pub resync_interval: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            safety_margin_ms: 1_000,
            resync_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl From<&ClockSettings> for ClockConfig {
    fn from(settings: &ClockSettings) -> Self {
        Self {
            safety_margin_ms: settings.safety_margin_ms,
            resync_interval: Duration::from_secs(settings.resync_interval_secs),
        }
    }
}

/// 동기화 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// 아직 동기화되지 않음
    Unsynced,
    /// 동기화됨
    Synced {
        /// 로컬 시각에 더할 offset (안전 마진 포함)
        offset_ms: i64,
        /// 동기화 완료 시각 (로컬)
        synced_at_ms: i64,
    },
}

type SyncFuture = Shared<BoxFuture<'static, ExchangeResult<i64>>>;

struct ClockInner {
    source: Arc<dyn ServerTimeSource>,
    local: Arc<dyn LocalClock>,
    config: ClockConfig,
    state: RwLock<ClockState>,
    in_flight: Mutex<Option<SyncFuture>>,
}

impl ClockInner {
    fn state(&self) -> ClockState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sync_once(&self) -> ExchangeResult<i64> {
        let t0 = self.local.now_ms();
        let server_ms = self.source.server_time_ms().await.map_err(|e| {
            warn!(error = %e, "Clock synchronization failed");
            e
        })?;
        let t1 = self.local.now_ms();

        let rtt = (t1 - t0).max(0);
        let estimated_server_ms = server_ms + rtt / 2;
        let offset_ms = (estimated_server_ms - t1) - self.config.safety_margin_ms;

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = ClockState::Synced {
            offset_ms,
            synced_at_ms: t1,
        };

        info!(offset_ms, rtt_ms = rtt, "Clock synchronized");
        Ok(offset_ms)
    }
}

/// 시계 동기화기.
///
/// 복제 비용이 낮은 핸들이며 복제본은 같은 상태를 공유합니다.
#[derive(Clone)]
pub struct ClockSync {
    inner: Arc<ClockInner>,
}

impl fmt::Debug for ClockSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSync")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl ClockSync {
    /// 시스템 시계를 사용하는 동기화기를 생성합니다.
    pub fn new(source: Arc<dyn ServerTimeSource>, config: ClockConfig) -> Self {
        Self::with_local_clock(source, Arc::new(SystemClock), config)
    }

    /// 로컬 시계를 주입해 동기화기를 생성합니다.
    pub fn with_local_clock(
        source: Arc<dyn ServerTimeSource>,
        local: Arc<dyn LocalClock>,
        config: ClockConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                source,
                local,
                config,
                state: RwLock::new(ClockState::Unsynced),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// 현재 동기화 상태.
    pub fn state(&self) -> ClockState {
        self.inner.state()
    }

    /// 현재 적용 중인 offset (밀리초).
    ///
    /// 동기화 전에는 안전 마진만 적용합니다.
    pub fn offset_ms(&self) -> i64 {
        match self.inner.state() {
            ClockState::Synced { offset_ms, .. } => offset_ms,
            ClockState::Unsynced => -self.inner.config.safety_margin_ms,
        }
    }

    /// 서명 요청에 사용할 현재 시각 (`local + offset`).
    pub fn now_ms(&self) -> i64 {
        self.inner.local.now_ms() + self.offset_ms()
    }

    /// 재동기화가 필요한지 확인합니다.
    pub fn is_stale(&self) -> bool {
        match self.inner.state() {
            ClockState::Unsynced => true,
            ClockState::Synced { synced_at_ms, .. } => {
                let age_ms = self.inner.local.now_ms() - synced_at_ms;
                age_ms >= self.inner.config.resync_interval.as_millis() as i64
            }
        }
    }

    /// 서버 시각을 조회해 offset을 갱신합니다.
    ///
    /// 이미 진행 중인 동기화가 있으면 새로 시작하지 않고 그 결과를 기다립니다.
    /// 실패는 항상 호출자에게 전달되며 offset은 바뀌지 않습니다.
    pub async fn sync(&self) -> ExchangeResult<i64> {
        let pending = self.join_or_start();
        let result = pending.clone().await;
        self.clear_in_flight(&pending);
        result
    }

    /// 필요할 때만 동기화합니다.
    ///
    /// 진행 중인 동기화가 있으면 합류하고, 없으면 마지막 동기화가
    /// 재동기화 주기를 넘긴 경우에만 새로 동기화합니다. 이전 offset이 있으면
    /// 실패해도 그 값으로 계속 진행합니다.
    pub async fn ensure_synced(&self) -> ExchangeResult<()> {
        if !self.has_pending_sync() && !self.is_stale() {
            return Ok(());
        }

        match self.sync().await {
            Ok(_) => Ok(()),
            Err(e) => match self.inner.state() {
                ClockState::Synced { offset_ms, .. } => {
                    warn!(error = %e, offset_ms, "Clock resync failed, keeping previous offset");
                    Ok(())
                }
                ClockState::Unsynced => Err(e),
            },
        }
    }

    /// 주기적으로 재동기화하는 백그라운드 작업을 시작합니다.
    pub fn spawn_periodic_resync(&self) -> JoinHandle<()> {
        let clock = self.clone();
        let period = self.inner.config.resync_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 첫 tick은 즉시 완료됨
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = clock.sync().await {
                    warn!(error = %e, "Periodic clock resync failed");
                }
            }
        })
    }

    fn has_pending_sync(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|pending| pending.peek().is_none())
    }

    fn join_or_start(&self) -> SyncFuture {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pending) = in_flight.as_ref() {
            if pending.peek().is_none() {
                debug!("Joining in-flight clock synchronization");
                return pending.clone();
            }
        }

        let inner = Arc::clone(&self.inner);
        let pending = async move { inner.sync_once().await }.boxed().shared();
        *in_flight = Some(pending.clone());
        pending
    }

    fn clear_in_flight(&self, finished: &SyncFuture) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if in_flight
            .as_ref()
            .is_some_and(|pending| pending.ptr_eq(finished))
        {
            *in_flight = None;
        }
    }
}
