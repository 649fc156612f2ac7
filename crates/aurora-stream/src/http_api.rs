//! HTTP REST API 클라이언트.
//!
//! `MetricsApi` 포트 구현. 상태 코드별 에러 매핑 + 재시도 로직.

use async_trait::async_trait;
use aurora_core::error::CoreError;
use aurora_core::models::point::{parse_reading, MetricPoint};
use aurora_core::models::stream::FilterParams;
use aurora_core::ports::metrics_api::MetricsApi;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// 재시도 가능한 에러인지 판별
fn is_retryable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
    )
}

/// timeseries 응답 래퍼 — reading은 파싱 단계에서 검증한다
#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    #[serde(default)]
    readings: Vec<serde_json::Value>,
}

/// REST API 클라이언트 — `MetricsApi` 포트 구현
pub struct HttpMetricsApi {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpMetricsApi {
    /// 새 HTTP API 클라이언트 생성
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(&self, resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let status_code = status.as_u16();
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        match status_code {
            404 => Err(CoreError::NotFound {
                resource_type: "API".to_string(),
                id: text,
            }),
            429 => {
                // Rate Limit — Retry-After 헤더 파싱 (기본 60초)
                let retry_after = 60;
                Err(CoreError::RateLimit {
                    retry_after_secs: retry_after,
                })
            }
            503 => Err(CoreError::ServiceUnavailable(text)),
            _ => Err(CoreError::Api {
                status: status_code,
                message: text,
            }),
        }
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut last_error = CoreError::Internal("요청 실패".to_string());
        let mut delay = Duration::from_secs(1);

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable(&e) || attempt == self.max_retries {
                        return Err(e);
                    }

                    warn!(
                        "요청 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt + 1,
                        self.max_retries + 1
                    );

                    // RateLimit의 경우 서버 지정 대기 시간 사용
                    if let CoreError::RateLimit { retry_after_secs } = &e {
                        delay = Duration::from_secs(*retry_after_secs);
                    }

                    last_error = e;
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl MetricsApi for HttpMetricsApi {
    async fn timeseries(
        &self,
        stream_name: &str,
        hours: u32,
        filter: &FilterParams,
    ) -> Result<Vec<MetricPoint>, CoreError> {
        debug!("과거 구간 조회: stream={stream_name}, hours={hours}");

        self.execute_with_retry(|| async {
            let url = format!("{}/api/{stream_name}/timeseries", self.base_url);
            let mut query = vec![("hours", hours.to_string())];
            query.extend(filter.to_query());

            let resp = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| CoreError::Network(format!("timeseries 요청 실패: {e}")))?;

            let resp = self.check_response(resp).await?;
            let body: TimeseriesResponse = resp
                .json()
                .await
                .map_err(|e| CoreError::Internal(format!("timeseries 응답 파싱 실패: {e}")))?;

            let total = body.readings.len();
            let mut points = Vec::with_capacity(total);
            for raw in &body.readings {
                match parse_reading(raw) {
                    Ok(point) => points.push(point),
                    Err(reason) => debug!("잘못된 reading 폐기: {reason}"),
                }
            }

            if points.len() < total {
                debug!("reading {}건 중 {}건 채택", total, points.len());
            }
            Ok(points)
        })
        .await
    }

    async fn latest(
        &self,
        stream_name: &str,
        filter: &FilterParams,
    ) -> Result<Option<MetricPoint>, CoreError> {
        let result = self
            .execute_with_retry(|| async {
                let url = format!("{}/api/{stream_name}/latest", self.base_url);
                let resp = self
                    .client
                    .get(&url)
                    .query(&filter.to_query())
                    .send()
                    .await
                    .map_err(|e| CoreError::Network(format!("latest 요청 실패: {e}")))?;

                let resp = self.check_response(resp).await?;
                let raw: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| CoreError::Internal(format!("latest 응답 파싱 실패: {e}")))?;
                Ok(raw)
            })
            .await;

        match result {
            // 아직 측정점이 없는 스트림
            Err(CoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
            Ok(raw) => match parse_reading(&raw) {
                Ok(point) => Ok(Some(point)),
                Err(reason) => {
                    debug!("잘못된 latest reading 폐기: {reason}");
                    Ok(None)
                }
            },
        }
    }

    async fn stream_health(&self) -> Result<(), CoreError> {
        let url = format!("{}/api/stream/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("스트림 헬스 체크 실패: {e}")))?;

        self.check_response(resp).await?;
        Ok(())
    }
}
