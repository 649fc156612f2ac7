//! 폴링 스트림 소스.
//!
//! `StreamSource` 포트의 폴백 전송 구현. 고정 주기로 latest를 조회하고
//! 마지막으로 본 타임스탬프 이후의 측정점만 내보낸다. 일시적 조회 실패는
//! 임계값까지 견딘 뒤에야 연결 유실로 판정한다.

use async_trait::async_trait;
use aurora_core::error::CoreError;
use aurora_core::models::stream::{FilterParams, Transport};
use aurora_core::ports::metrics_api::MetricsApi;
use aurora_core::ports::stream_source::{SourceEvent, StreamSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 폴링 스트림 소스
pub struct PollSource {
    api: Arc<dyn MetricsApi>,
    interval: Duration,
    failure_threshold: u32,
}

impl PollSource {
    /// 새 폴링 소스 생성
    pub fn new(api: Arc<dyn MetricsApi>, interval: Duration, failure_threshold: u32) -> Self {
        Self {
            api,
            interval,
            failure_threshold: failure_threshold.max(1),
        }
    }
}

#[async_trait]
impl StreamSource for PollSource {
    fn transport(&self) -> Transport {
        Transport::Polling
    }

    async fn run(
        &self,
        stream_name: &str,
        filter: &FilterParams,
        tx: mpsc::Sender<SourceEvent>,
    ) -> Result<(), CoreError> {
        let mut last_seen: Option<DateTime<Utc>> = None;
        let mut failures = 0u32;
        let mut opened = false;

        debug!("폴링 시작: {stream_name} ({:?} 주기)", self.interval);

        loop {
            match self.api.latest(stream_name, filter).await {
                Ok(maybe_point) => {
                    failures = 0;

                    // 첫 성공 응답이 곧 "연결 수립"이다
                    if !opened {
                        opened = true;
                        if tx.send(SourceEvent::Opened).await.is_err() {
                            return Ok(());
                        }
                    }

                    if let Some(point) = maybe_point {
                        let fresh = last_seen.map_or(true, |seen| point.timestamp > seen);
                        if fresh {
                            last_seen = Some(point.timestamp);
                            if tx.send(SourceEvent::Point(point)).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "폴링 조회 실패 ({failures}/{}): {stream_name} — {e}",
                        self.failure_threshold
                    );
                    if failures >= self.failure_threshold {
                        return Err(e);
                    }
                }
            }

            // 수신 측이 사라졌으면 타이머를 돌릴 이유가 없다
            if tx.is_closed() {
                debug!("수신 측 종료, 폴링 중단: {stream_name}");
                return Ok(());
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
