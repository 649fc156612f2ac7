//! 전송 전략 선택.
//!
//! 프로브 결과 하나로 SSE/폴링 소스를 고른다. 연결 코드에는 전송별
//! 분기가 없다 — 여기서 만든 `StreamSource`가 전략 그 자체다.

use aurora_core::config::StreamConfig;
use aurora_core::error::CoreError;
use aurora_core::ports::metrics_api::MetricsApi;
use aurora_core::ports::stream_source::StreamSource;
use std::sync::Arc;
use std::time::Duration;

use crate::poll_source::PollSource;
use crate::sse_source::SseSource;

/// 스트림 소스 팩토리
///
/// 스트림 연결이 전송을 (재)선택할 때 호출한다. 테스트는 이 trait으로
/// 가짜 소스를 주입한다.
pub trait SourceFactory: Send + Sync {
    /// 프로브 결과에 맞는 소스 생성
    fn create(&self, sse_available: bool) -> Arc<dyn StreamSource>;
}

/// 기본 팩토리 — SSE 가용 시 `SseSource`, 아니면 `PollSource`
pub struct TransportSelector {
    base_url: String,
    sse_client: reqwest::Client,
    api: Arc<dyn MetricsApi>,
    config: StreamConfig,
}

impl TransportSelector {
    /// 새 선택기 생성
    ///
    /// SSE용 HTTP 클라이언트는 전체 타임아웃 없이 만든다 — 스트림은
    /// 세션 내내 열려 있고, 수립 실패만 connect 타임아웃으로 걸러낸다.
    pub fn new(
        base_url: &str,
        api: Arc<dyn MetricsApi>,
        config: StreamConfig,
    ) -> Result<Self, CoreError> {
        let sse_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            sse_client,
            api,
            config,
        })
    }
}

impl SourceFactory for TransportSelector {
    fn create(&self, sse_available: bool) -> Arc<dyn StreamSource> {
        if sse_available {
            Arc::new(SseSource::new(&self.base_url, self.sse_client.clone()))
        } else {
            Arc::new(PollSource::new(
                Arc::clone(&self.api),
                self.config.poll_interval(),
                self.config.poll_failure_threshold,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_api::HttpMetricsApi;
    use aurora_core::models::stream::Transport;

    fn selector() -> TransportSelector {
        let api = Arc::new(
            HttpMetricsApi::new("http://localhost:8000", Duration::from_secs(5)).unwrap(),
        );
        TransportSelector::new("http://localhost:8000", api, StreamConfig::default()).unwrap()
    }

    #[test]
    fn sse_available_selects_sse() {
        assert_eq!(selector().create(true).transport(), Transport::Sse);
    }

    #[test]
    fn sse_unavailable_selects_polling() {
        assert_eq!(selector().create(false).transport(), Transport::Polling);
    }
}
