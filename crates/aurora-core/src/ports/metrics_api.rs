//! 메트릭 API 포트.
//!
//! 구현: `aurora-stream` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::point::MetricPoint;
use crate::models::stream::FilterParams;

/// 백엔드 메트릭 REST API
///
/// 과거 구간 조회와 폴링 폴백, 스트림 가용성 확인에 사용한다.
/// 응답 캐싱은 호출 측 책임이다 (같은 쿼리를 라이브 측정점마다
/// 다시 조회하지 않는다).
#[async_trait]
pub trait MetricsApi: Send + Sync {
    /// 과거 구간 조회
    ///
    /// `GET /api/{stream}/timeseries?hours={hours}&...`
    /// 서버가 타임스탬프 오름차순으로 정렬해 반환한다.
    /// 검증에 실패한 reading은 버리고 나머지를 반환한다.
    async fn timeseries(
        &self,
        stream_name: &str,
        hours: u32,
        filter: &FilterParams,
    ) -> Result<Vec<MetricPoint>, CoreError>;

    /// 최신 측정점 1건 조회 (폴링 폴백용)
    ///
    /// `GET /api/{stream}/latest?...`
    /// 아직 측정점이 없으면 `None`.
    async fn latest(
        &self,
        stream_name: &str,
        filter: &FilterParams,
    ) -> Result<Option<MetricPoint>, CoreError>;

    /// 스트림(SSE) 서빙 가능 여부 확인
    ///
    /// `GET /api/stream/health` — 2xx면 Ok. 타임아웃 처리는
    /// 호출하는 프로브 측 책임이다.
    async fn stream_health(&self) -> Result<(), CoreError>;
}
