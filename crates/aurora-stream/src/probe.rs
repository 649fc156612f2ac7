//! 전송 프로브.
//!
//! 세션 시작 시 한 번 SSE 서빙 가능 여부를 확인하고 결과를 캐시한다.
//! 이후 열리는 모든 스트림 연결이 이 결과를 공유한다. 프로브 실패는
//! 치명적이지 않다 — 폴링으로 유도할 뿐이다.

use aurora_core::ports::metrics_api::MetricsApi;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// 프로브 진행 상태 — 상태 배지 렌더링용
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatus {
    /// SSE 사용 가능 여부 (미확정이면 false)
    pub available: bool,
    /// 아직 확인 중인지 여부
    pub checking: bool,
}

/// SSE 가용성 프로브
///
/// 결과는 프로세스 수명 동안 캐시되며 `reprobe()`(명시적 사용자 동작)
/// 로만 갱신된다. 테스트는 `fixed()`로 결과를 주입한다.
pub struct TransportProbe {
    api: Option<Arc<dyn MetricsApi>>,
    timeout: Duration,
    result: RwLock<Option<bool>>,
}

impl TransportProbe {
    /// 새 프로브 생성
    pub fn new(api: Arc<dyn MetricsApi>, timeout: Duration) -> Self {
        Self {
            api: Some(api),
            timeout,
            result: RwLock::new(None),
        }
    }

    /// 고정 결과 프로브 (테스트/강제 설정용)
    pub fn fixed(available: bool) -> Self {
        Self {
            api: None,
            timeout: Duration::ZERO,
            result: RwLock::new(Some(available)),
        }
    }

    /// SSE 가용성 확인 (최초 1회만 실제 요청)
    pub async fn resolve(&self) -> bool {
        if let Some(cached) = *self.result.read() {
            return cached;
        }

        let available = self.check().await;
        *self.result.write() = Some(available);
        info!(
            "전송 프로브 완료: SSE {}",
            if available { "사용 가능" } else { "불가 — 폴링 사용" }
        );
        available
    }

    /// 캐시된 결과 (아직 확인 전이면 None)
    pub fn cached(&self) -> Option<bool> {
        *self.result.read()
    }

    /// 현재 프로브 상태
    pub fn status(&self) -> ProbeStatus {
        let cached = self.cached();
        ProbeStatus {
            available: cached.unwrap_or(false),
            checking: cached.is_none(),
        }
    }

    /// 명시적 재확인 — 캐시를 덮어쓴다
    pub async fn reprobe(&self) -> bool {
        let available = self.check().await;
        *self.result.write() = Some(available);
        info!("전송 재프로브 완료: SSE 사용 가능 = {available}");
        available
    }

    /// 실제 가용성 확인 (타임아웃 포함, 재시도 없음)
    async fn check(&self) -> bool {
        let Some(api) = &self.api else {
            return false;
        };

        match timeout(self.timeout, api.stream_health()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("스트림 프로브 실패: {e}");
                false
            }
            Err(_) => {
                warn!("스트림 프로브 타임아웃 ({:?})", self.timeout);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_api::HttpMetricsApi;

    #[test]
    fn fixed_probe_is_preresolved() {
        let probe = TransportProbe::fixed(true);
        assert_eq!(probe.cached(), Some(true));
        assert!(!probe.status().checking);
        assert!(probe.status().available);
    }

    #[tokio::test]
    async fn resolve_caches_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/stream/health")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let api = Arc::new(HttpMetricsApi::new(&server.url(), Duration::from_secs(5)).unwrap());
        let probe = TransportProbe::new(api, Duration::from_secs(3));

        assert_eq!(probe.cached(), None);
        assert!(probe.status().checking);

        assert!(probe.resolve().await);
        // 두 번째 resolve는 캐시를 사용한다 (expect(1))
        assert!(probe.resolve().await);
        assert_eq!(probe.cached(), Some(true));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_health_means_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream/health")
            .with_status(500)
            .create_async()
            .await;

        let api = Arc::new(HttpMetricsApi::new(&server.url(), Duration::from_secs(5)).unwrap());
        let probe = TransportProbe::new(api, Duration::from_secs(3));

        assert!(!probe.resolve().await);
        assert_eq!(probe.cached(), Some(false));
    }

    #[tokio::test]
    async fn connection_refused_means_unavailable() {
        // 예약 포트 — 즉시 connection refused
        let api = Arc::new(HttpMetricsApi::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap());
        let probe = TransportProbe::new(api, Duration::from_secs(3));
        assert!(!probe.resolve().await);
    }

    #[tokio::test]
    async fn reprobe_overwrites_cache() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream/health")
            .with_status(200)
            .create_async()
            .await;

        let api = Arc::new(HttpMetricsApi::new(&server.url(), Duration::from_secs(5)).unwrap());
        let probe = TransportProbe::new(api, Duration::from_secs(3));

        // 캐시를 false로 심어 두고 reprobe로 뒤집는다
        *probe.result.write() = Some(false);
        assert!(!probe.resolve().await);

        assert!(probe.reprobe().await);
        assert_eq!(probe.cached(), Some(true));
    }
}
