//! 스트림 연결 상태 기계.
//!
//! 스트림 하나당 태스크 하나. 소스(SSE/폴링)가 보내는 이벤트를 버퍼에
//! 반영하고, 단계 전이를 watch 채널로 브로드캐스트한다. 실패는 capped
//! exponential backoff로 자동 재시도하며 세션이 끝날 때까지 포기하지
//! 않는다.
//!
//! 단계 전이:
//! `Disconnected → Connecting → Connected → {Disconnected, Error}`,
//! `Error → Connecting` (backoff 경과 또는 수동 reconnect).

use aurora_core::config::StreamConfig;
use aurora_core::error::CoreError;
use aurora_core::models::point::MetricPoint;
use aurora_core::models::series::MergedSeries;
use aurora_core::models::stream::{FilterParams, StreamPhase, StreamState, Transport};
use aurora_core::ports::stream_source::{SourceEvent, StreamSource};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::buffer::PointBuffer;
use crate::transport::SourceFactory;

/// 연결 통계 — 대시보드 진단 패널용
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// 버퍼에 반영된 측정점 수
    pub points_received: u64,
    /// 연결 시도 횟수 (재시도 포함)
    pub connect_attempts: u64,
    /// 마지막 측정점 수신 시각
    pub last_point_at: Option<DateTime<Utc>>,
}

/// 연결 태스크와 소비자가 공유하는 상태
struct Inner {
    name: String,
    filter: FilterParams,
    config: StreamConfig,
    factory: Arc<dyn SourceFactory>,
    sse_available: bool,
    /// 단계/전송 브로드캐스트
    state_tx: watch::Sender<StreamState>,
    /// 버퍼 변경 알림 (단조 증가 리비전)
    revision_tx: watch::Sender<u64>,
    /// 수동 reconnect 신호 (세대 카운터)
    restart_tx: watch::Sender<u64>,
    /// open/close 의도
    desired_tx: watch::Sender<bool>,
    buffer: RwLock<PointBuffer>,
    /// close() 직후 버퍼 쓰기를 막는 게이트
    write_gate: AtomicBool,
    points_received: AtomicU64,
    connect_attempts: AtomicU64,
    last_point_at: RwLock<Option<DateTime<Utc>>>,
}

impl Inner {
    fn set_state(&self, transport: Transport, phase: StreamPhase, last_error: Option<String>) {
        self.state_tx.send_replace(StreamState {
            stream_name: self.name.clone(),
            transport,
            phase,
            last_error,
        });
    }

    fn push_point(&self, point: MetricPoint) {
        if !self.write_gate.load(Ordering::SeqCst) {
            return;
        }
        let at = point.timestamp;
        self.buffer.write().push(point);
        self.points_received.fetch_add(1, Ordering::Relaxed);
        *self.last_point_at.write() = Some(at);
        self.revision_tx.send_modify(|rev| *rev += 1);
    }
}

/// 단일 스트림 연결
///
/// 생성 직후에는 Disconnected다. `open()`으로 올리고, 소비자가 사라지면
/// drop으로 태스크까지 정리된다. 반드시 tokio 런타임 안에서 생성해야
/// 한다.
pub struct StreamConnection {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamConnection {
    /// 새 스트림 연결 생성 (Disconnected 상태)
    pub fn new(
        stream_name: &str,
        factory: Arc<dyn SourceFactory>,
        sse_available: bool,
        filter: FilterParams,
        config: StreamConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(StreamState::new(stream_name));
        let (revision_tx, _) = watch::channel(0u64);
        let (restart_tx, _) = watch::channel(0u64);
        let (desired_tx, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            name: stream_name.to_string(),
            filter,
            buffer: RwLock::new(PointBuffer::new(config.buffer_capacity)),
            config,
            factory,
            sse_available,
            state_tx,
            revision_tx,
            restart_tx,
            desired_tx,
            write_gate: AtomicBool::new(false),
            points_received: AtomicU64::new(0),
            connect_attempts: AtomicU64::new(0),
            last_point_at: RwLock::new(None),
        });

        let task = tokio::spawn(run_loop(Arc::clone(&inner)));

        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// 스트림 이름
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 이 연결의 필터 파라미터
    pub fn filter(&self) -> &FilterParams {
        &self.inner.filter
    }

    /// 연결 열기 — 이미 열려 있으면 아무것도 하지 않는다
    pub fn open(&self) {
        self.inner.write_gate.store(true, Ordering::SeqCst);
        let changed = self.inner.desired_tx.send_if_modified(|up| {
            if *up {
                false
            } else {
                *up = true;
                true
            }
        });
        if changed {
            let transport = self.inner.state_tx.borrow().transport;
            self.inner.set_state(transport, StreamPhase::Connecting, None);
        }
    }

    /// 연결 닫기 — 진행 중인 전송을 취소한다. 멱등.
    ///
    /// 반환 이후에는 버퍼 쓰기가 일어나지 않는다.
    pub fn close(&self) {
        self.inner.write_gate.store(false, Ordering::SeqCst);
        self.inner.desired_tx.send_if_modified(|up| {
            if *up {
                *up = false;
                true
            } else {
                false
            }
        });
        self.inner
            .set_state(Transport::None, StreamPhase::Disconnected, None);
    }

    /// 강제 재연결 — 현재 단계와 무관하게 즉시 다시 연결을 시도한다
    pub fn reconnect(&self) {
        self.inner.write_gate.store(true, Ordering::SeqCst);
        let _ = self.inner.desired_tx.send_if_modified(|up| {
            if *up {
                false
            } else {
                *up = true;
                true
            }
        });
        let transport = self.inner.state_tx.borrow().transport;
        self.inner.set_state(transport, StreamPhase::Connecting, None);
        self.inner.restart_tx.send_modify(|generation| *generation += 1);
    }

    /// 현재 연결 상태
    pub fn state(&self) -> StreamState {
        self.inner.state_tx.borrow().clone()
    }

    /// 현재 연결 단계
    pub fn phase(&self) -> StreamPhase {
        self.inner.state_tx.borrow().phase
    }

    /// open 의도 여부 (close 호출 전까지 true)
    pub fn is_open(&self) -> bool {
        *self.inner.desired_tx.borrow()
    }

    /// 상태 변경 구독
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.inner.state_tx.subscribe()
    }

    /// 버퍼 변경 알림 구독 (값은 단조 증가 리비전)
    pub fn subscribe_points(&self) -> watch::Receiver<u64> {
        self.inner.revision_tx.subscribe()
    }

    /// 현재 버퍼 리비전
    pub fn revision(&self) -> u64 {
        *self.inner.revision_tx.borrow()
    }

    /// 라이브 버퍼의 불변 스냅샷
    pub fn snapshot(&self) -> Vec<MetricPoint> {
        self.inner.buffer.read().snapshot()
    }

    /// 과거 구간과 병합한 시계열
    pub fn merged(&self, historical: &[MetricPoint]) -> MergedSeries {
        self.inner.buffer.read().merge(historical)
    }

    /// 연결 통계
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            points_received: self.inner.points_received.load(Ordering::Relaxed),
            connect_attempts: self.inner.connect_attempts.load(Ordering::Relaxed),
            last_point_at: *self.inner.last_point_at.read(),
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// 한 번의 연결 시도가 끝난 이유
enum Outcome {
    /// close() 또는 상위 비활성화
    Shutdown,
    /// 수동 reconnect 요청
    Restart,
    /// 소스 종료 (정상 EOF 포함 — 세션 중 EOF는 유실로 취급)
    Ended(Result<Result<(), CoreError>, tokio::task::JoinError>),
}

/// 연결 태스크 본체
async fn run_loop(inner: Arc<Inner>) {
    let mut desired_rx = inner.desired_tx.subscribe();
    let mut restart_rx = inner.restart_tx.subscribe();
    let config = inner.config.clone();

    let mut use_sse = inner.sse_available;
    let mut source: Arc<dyn StreamSource> = inner.factory.create(use_sse);
    let mut retry_delay = config.backoff_initial();
    let mut failed_opens = 0u32;

    loop {
        // 내려간 동안에는 open/reconnect 신호만 기다린다
        while !*desired_rx.borrow_and_update() {
            if desired_rx.changed().await.is_err() {
                return;
            }
        }

        // 새 시도 자체가 응답이므로 보류된 reconnect 신호는 소모한다
        restart_rx.borrow_and_update();

        inner.connect_attempts.fetch_add(1, Ordering::Relaxed);
        inner.set_state(source.transport(), StreamPhase::Connecting, None);

        let (tx, mut rx) = mpsc::channel(config.channel_capacity);
        let run_source = Arc::clone(&source);
        let stream_name = inner.name.clone();
        let filter = inner.filter.clone();
        let handle = tokio::spawn(async move { run_source.run(&stream_name, &filter, tx).await });

        let mut opened = false;
        let outcome = loop {
            tokio::select! {
                _ = desired_rx.changed() => {
                    handle.abort();
                    break Outcome::Shutdown;
                }
                _ = restart_rx.changed() => {
                    handle.abort();
                    break Outcome::Restart;
                }
                event = rx.recv() => match event {
                    Some(SourceEvent::Opened) => {
                        opened = true;
                        failed_opens = 0;
                        retry_delay = config.backoff_initial();
                        inner.set_state(source.transport(), StreamPhase::Connected, None);
                        debug!("스트림 연결됨: {} ({})", inner.name, source.transport());
                    }
                    Some(SourceEvent::Point(point)) => {
                        inner.push_point(point);
                    }
                    None => break Outcome::Ended(handle.await),
                }
            }
        };

        match outcome {
            Outcome::Shutdown => {
                if !*desired_rx.borrow_and_update() {
                    inner.set_state(Transport::None, StreamPhase::Disconnected, None);
                    debug!("스트림 연결 해제: {}", inner.name);
                }
            }
            Outcome::Restart => {
                debug!("수동 재연결: {}", inner.name);
                retry_delay = config.backoff_initial();
            }
            Outcome::Ended(result) => {
                let message = match result {
                    Ok(Ok(())) => "스트림이 종료됨".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => format!("소스 태스크 실패: {e}"),
                };
                warn!("스트림 연결 유실: {} — {message}", inner.name);

                // 한 번도 수립되지 못한 SSE가 반복되면 폴링으로 강등
                if !opened && use_sse {
                    failed_opens += 1;
                    if failed_opens >= config.sse_failure_threshold {
                        warn!(
                            "SSE 수립 {failed_opens}회 연속 실패, 폴링으로 전환: {}",
                            inner.name
                        );
                        use_sse = false;
                        source = inner.factory.create(false);
                        failed_opens = 0;
                    }
                }

                inner.set_state(source.transport(), StreamPhase::Error, Some(message));

                // backoff 대기 — close/reconnect로 중단 가능
                tokio::select! {
                    _ = tokio::time::sleep(retry_delay) => {
                        retry_delay = (retry_delay * 2).min(config.backoff_max());
                    }
                    _ = restart_rx.changed() => {
                        retry_delay = config.backoff_initial();
                    }
                    _ = desired_rx.changed() => {}
                }
            }
        }
    }
}
