//! 멀티 스트림 수퍼바이저.
//!
//! 등록된 스트림 이름마다 독립된 연결을 하나씩 관리한다. 한 스트림의
//! 실패나 backoff가 다른 스트림을 지연시키지 않는다. 상태 배지용 요약과
//! "전체 재연결", 전체 활성/비활성 토글을 제공한다.

use aurora_core::config::StreamConfig;
use aurora_core::models::stream::{FilterParams, StreamPhase, StreamSummary, Transport};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::connection::StreamConnection;
use crate::probe::TransportProbe;
use crate::transport::SourceFactory;

/// 스트림 연결 집합 관리자
pub struct StreamSupervisor {
    factory: Arc<dyn SourceFactory>,
    probe: Arc<TransportProbe>,
    filter: FilterParams,
    config: StreamConfig,
    streams: RwLock<BTreeMap<String, Arc<StreamConnection>>>,
    enabled: AtomicBool,
}

impl StreamSupervisor {
    /// 새 수퍼바이저 생성 (활성 상태)
    pub fn new(
        factory: Arc<dyn SourceFactory>,
        probe: Arc<TransportProbe>,
        filter: FilterParams,
        config: StreamConfig,
    ) -> Self {
        Self {
            factory,
            probe,
            filter,
            config,
            streams: RwLock::new(BTreeMap::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// 스트림 등록 — 이름마다 연결을 만들고, 활성 상태면 바로 연다
    ///
    /// 첫 등록 시 전송 프로브를 확정한다. 이미 등록된 이름은 무시한다.
    pub async fn register(&self, stream_names: &[&str]) {
        let sse_available = self.probe.resolve().await;
        let enabled = self.is_enabled();

        let mut streams = self.streams.write();
        for name in stream_names {
            if streams.contains_key(*name) {
                continue;
            }

            let connection = Arc::new(StreamConnection::new(
                name,
                Arc::clone(&self.factory),
                sse_available,
                self.filter.clone(),
                self.config.clone(),
            ));
            if enabled {
                connection.open();
            }
            debug!("스트림 등록: {name}");
            streams.insert(name.to_string(), connection);
        }
    }

    /// 스트림 해제 — 마지막 소비자가 떠났을 때 호출한다
    pub fn deregister(&self, stream_name: &str) {
        if let Some(connection) = self.streams.write().remove(stream_name) {
            connection.close();
            debug!("스트림 해제: {stream_name}");
        }
    }

    /// 등록된 연결 조회
    pub fn get(&self, stream_name: &str) -> Option<Arc<StreamConnection>> {
        self.streams.read().get(stream_name).cloned()
    }

    /// 등록된 스트림 이름 목록
    pub fn stream_names(&self) -> Vec<String> {
        self.streams.read().keys().cloned().collect()
    }

    /// 현재 상태 요약 — O(N) 순수 읽기, 렌더링 주기마다 호출해도 된다
    pub fn summary(&self) -> StreamSummary {
        let streams = self.streams.read();
        let mut summary = StreamSummary {
            total: streams.len(),
            ..StreamSummary::default()
        };

        for connection in streams.values() {
            let state = connection.state();
            if state.phase == StreamPhase::Connected {
                summary.connected += 1;
                match state.transport {
                    Transport::Sse => summary.sse += 1,
                    Transport::Polling => summary.polling += 1,
                    Transport::None => {}
                }
            }
        }
        summary
    }

    /// 모든 연결을 현재 단계와 무관하게 다시 연결한다
    ///
    /// 비활성 상태에서는 아무것도 하지 않는다 — 토글이 우선한다.
    pub fn reconnect_all(&self) {
        if !self.is_enabled() {
            debug!("비활성 상태, 전체 재연결 무시");
            return;
        }

        let streams = self.streams.read();
        info!("전체 재연결: {}개 스트림", streams.len());
        for connection in streams.values() {
            connection.reconnect();
        }
    }

    /// 전체 활성/비활성 토글
    ///
    /// 비활성화는 모든 연결을 닫고(Disconnected), 재활성화는 전부
    /// 다시 연다(Connecting부터).
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was == enabled {
            return;
        }

        let streams = self.streams.read();
        if enabled {
            info!("스트림 활성화: {}개 연결 열기", streams.len());
            for connection in streams.values() {
                connection.open();
            }
        } else {
            info!("스트림 비활성화: {}개 연결 닫기", streams.len());
            for connection in streams.values() {
                connection.close();
            }
        }
    }

    /// 현재 활성 여부
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_core::error::CoreError;
    use aurora_core::models::point::MetricPoint;
    use aurora_core::ports::stream_source::{SourceEvent, StreamSource};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// 스트림 이름에 따라 동작이 달라지는 팩토리.
    /// `fail_streams`에 포함된 이름은 수립 없이 실패하고,
    /// 나머지는 열린 채 유지되며 측정점 하나를 내보낸다.
    struct ScenarioFactory {
        fail_streams: Vec<String>,
        created_with: Mutex<Vec<bool>>,
    }

    impl ScenarioFactory {
        fn new(fail_streams: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                fail_streams: fail_streams.iter().map(|s| s.to_string()).collect(),
                created_with: Mutex::new(Vec::new()),
            })
        }
    }

    impl SourceFactory for ScenarioFactory {
        fn create(&self, sse_available: bool) -> Arc<dyn StreamSource> {
            self.created_with.lock().push(sse_available);
            Arc::new(ScenarioSource {
                fail_streams: self.fail_streams.clone(),
                transport: if sse_available {
                    Transport::Sse
                } else {
                    Transport::Polling
                },
            })
        }
    }

    struct ScenarioSource {
        fail_streams: Vec<String>,
        transport: Transport,
    }

    #[async_trait]
    impl StreamSource for ScenarioSource {
        fn transport(&self) -> Transport {
            self.transport
        }

        async fn run(
            &self,
            stream_name: &str,
            _filter: &FilterParams,
            tx: mpsc::Sender<SourceEvent>,
        ) -> Result<(), CoreError> {
            if self.fail_streams.iter().any(|s| s == stream_name) {
                return Err(CoreError::Network("소켓 끊김".to_string()));
            }

            if tx.send(SourceEvent::Opened).await.is_err() {
                return Ok(());
            }
            let point = MetricPoint::at_ms(100).with_field("snr", 9.0);
            let _ = tx.send(SourceEvent::Point(point)).await;
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn test_config() -> StreamConfig {
        StreamConfig {
            // Error 단계가 유지되도록 긴 backoff
            backoff_initial_secs: 30,
            backoff_max_secs: 30,
            buffer_capacity: 10,
            ..StreamConfig::default()
        }
    }

    fn supervisor_with(factory: Arc<ScenarioFactory>, sse: bool) -> StreamSupervisor {
        StreamSupervisor::new(
            factory,
            Arc::new(TransportProbe::fixed(sse)),
            FilterParams::default(),
            test_config(),
        )
    }

    async fn wait_for_phase(supervisor: &StreamSupervisor, name: &str, phase: StreamPhase) {
        let connection = supervisor.get(name).unwrap();
        let mut rx = connection.subscribe_state();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if rx.borrow().phase == phase {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{name}: {phase} 전이 대기 시간 초과"));
    }

    async fn wait_for_revision(connection: &StreamConnection, revision: u64) {
        let mut rx = connection.subscribe_points();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if *rx.borrow() >= revision {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("버퍼 리비전 대기 시간 초과");
    }

    #[tokio::test]
    async fn register_creates_independent_connections() {
        let factory = ScenarioFactory::new(&[]);
        let supervisor = supervisor_with(factory, true);

        supervisor.register(&["starlink", "gps"]).await;
        assert_eq!(supervisor.stream_names(), vec!["gps", "starlink"]);

        wait_for_phase(&supervisor, "starlink", StreamPhase::Connected).await;
        wait_for_phase(&supervisor, "gps", StreamPhase::Connected).await;

        let summary = supervisor.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.connected, 2);
        assert_eq!(summary.sse, 2);
        assert_eq!(summary.polling, 0);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let factory = ScenarioFactory::new(&[]);
        let supervisor = supervisor_with(factory, true);

        supervisor.register(&["starlink"]).await;
        let first = supervisor.get("starlink").unwrap();
        supervisor.register(&["starlink"]).await;

        // 같은 연결이 유지된다
        assert!(Arc::ptr_eq(&first, &supervisor.get("starlink").unwrap()));
        assert_eq!(supervisor.summary().total, 1);
    }

    #[tokio::test]
    async fn probe_unavailable_forces_polling_everywhere() {
        let factory = ScenarioFactory::new(&[]);
        let supervisor = supervisor_with(Arc::clone(&factory), false);

        supervisor.register(&["starlink", "gps", "weather"]).await;
        for name in ["starlink", "gps", "weather"] {
            wait_for_phase(&supervisor, name, StreamPhase::Connected).await;
        }

        // SSE 소스는 한 번도 만들어지지 않는다
        assert!(factory.created_with.lock().iter().all(|sse| !sse));

        let summary = supervisor.summary();
        assert_eq!(summary.polling, 3);
        assert_eq!(summary.sse, 0);
    }

    #[tokio::test]
    async fn failure_in_one_stream_leaves_others_alone() {
        let factory = ScenarioFactory::new(&["gps"]);
        let supervisor = supervisor_with(factory, true);

        supervisor.register(&["starlink", "gps"]).await;
        wait_for_phase(&supervisor, "starlink", StreamPhase::Connected).await;
        wait_for_phase(&supervisor, "gps", StreamPhase::Error).await;

        // starlink는 영향받지 않는다
        let starlink = supervisor.get("starlink").unwrap();
        wait_for_revision(&starlink, 1).await;
        assert_eq!(starlink.phase(), StreamPhase::Connected);
        assert_eq!(starlink.snapshot().len(), 1);

        let summary = supervisor.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.connected, 1);
    }

    #[tokio::test]
    async fn reconnect_all_hits_every_phase() {
        let factory = ScenarioFactory::new(&["gps"]);
        let supervisor = supervisor_with(factory, true);

        supervisor.register(&["starlink", "gps", "weather"]).await;
        wait_for_phase(&supervisor, "starlink", StreamPhase::Connected).await;
        wait_for_phase(&supervisor, "gps", StreamPhase::Error).await;
        supervisor.get("weather").unwrap().close();

        // {Connected, Error, Disconnected} 혼합 상태에서 전체 재연결
        supervisor.reconnect_all();

        // 호출 직후 모두 Connecting으로 전이되어 있다
        for name in ["starlink", "gps", "weather"] {
            assert_eq!(
                supervisor.get(name).unwrap().phase(),
                StreamPhase::Connecting,
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn disable_closes_all_enable_reopens() {
        let factory = ScenarioFactory::new(&[]);
        let supervisor = supervisor_with(factory, true);

        supervisor.register(&["starlink", "gps"]).await;
        wait_for_phase(&supervisor, "starlink", StreamPhase::Connected).await;
        wait_for_phase(&supervisor, "gps", StreamPhase::Connected).await;

        supervisor.set_enabled(false);
        assert!(!supervisor.is_enabled());
        for name in ["starlink", "gps"] {
            assert_eq!(
                supervisor.get(name).unwrap().phase(),
                StreamPhase::Disconnected
            );
        }
        assert_eq!(supervisor.summary().connected, 0);

        // 비활성 상태에서는 전체 재연결도 무시된다
        supervisor.reconnect_all();
        assert_eq!(
            supervisor.get("starlink").unwrap().phase(),
            StreamPhase::Disconnected
        );

        supervisor.set_enabled(true);
        wait_for_phase(&supervisor, "starlink", StreamPhase::Connected).await;
        wait_for_phase(&supervisor, "gps", StreamPhase::Connected).await;
    }

    #[tokio::test]
    async fn register_while_disabled_stays_closed() {
        let factory = ScenarioFactory::new(&[]);
        let supervisor = supervisor_with(factory, true);

        supervisor.set_enabled(false);
        supervisor.register(&["starlink"]).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            supervisor.get("starlink").unwrap().phase(),
            StreamPhase::Disconnected
        );
    }

    #[tokio::test]
    async fn deregister_removes_and_closes() {
        let factory = ScenarioFactory::new(&[]);
        let supervisor = supervisor_with(factory, true);

        supervisor.register(&["starlink", "gps"]).await;
        wait_for_phase(&supervisor, "gps", StreamPhase::Connected).await;

        let gps = supervisor.get("gps").unwrap();
        supervisor.deregister("gps");

        assert!(supervisor.get("gps").is_none());
        assert_eq!(gps.phase(), StreamPhase::Disconnected);
        assert_eq!(supervisor.summary().total, 1);

        // 모르는 이름 해제는 무해하다
        supervisor.deregister("gps");
    }
}
