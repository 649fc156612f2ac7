//! # aurora-stream
//!
//! SSE/폴링 라이브 메트릭 스트림 어댑터.
//! 백엔드의 REST API와 SSE 스트림을 소비하여, 대시보드가 구독하는
//! 스트림별 라이브 버퍼와 병합 시계열을 유지한다. 서버 구성 요소는 없다.
//!
//! ## 구조
//!
//! - [`probe`] — 세션당 1회 SSE 가용성 확인, 결과는 전 스트림 공유
//! - [`transport`] — 프로브 결과에 따른 SSE/폴링 전략 선택
//! - [`sse_source`] / [`poll_source`] — `StreamSource` 포트 구현
//! - [`connection`] — 스트림별 상태 기계 (backoff 재시도, 폴링 강등)
//! - [`buffer`] — 고정 용량 측정점 링 버퍼 + 순수 병합 함수
//! - [`supervisor`] — N개 연결 관리, 요약/전체 재연결/활성 토글
//! - [`live_series`] — 차트 하나가 소비하는 과거+라이브 데이터 계약
//! - [`http_api`] — `MetricsApi` 포트 구현 (reqwest)
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use aurora_stream::http_api::HttpMetricsApi;
//! use aurora_stream::probe::TransportProbe;
//! use aurora_stream::supervisor::StreamSupervisor;
//! use aurora_stream::transport::TransportSelector;
//!
//! let api = Arc::new(HttpMetricsApi::new(&base_url, timeout)?);
//! let probe = Arc::new(TransportProbe::new(Arc::clone(&api), config.probe_timeout()));
//! let selector = Arc::new(TransportSelector::new(&base_url, api, config.clone())?);
//! let supervisor = StreamSupervisor::new(selector, probe, filter, config);
//! supervisor.register(&["starlink", "gps"]).await;
//! ```

pub mod buffer;
pub mod connection;
pub mod http_api;
pub mod live_series;
pub mod poll_source;
pub mod probe;
pub mod sse_source;
pub mod supervisor;
pub mod transport;
