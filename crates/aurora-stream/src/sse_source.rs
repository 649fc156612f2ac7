//! SSE(Server-Sent Events) 스트림 소스.
//!
//! `StreamSource` 포트의 푸시 전송 구현. 이벤트 `data:` 페이로드를
//! JSON으로 파싱하고 검증을 통과한 측정점만 내보낸다. 잘못된
//! 페이로드는 스트림을 끊지 않고 조용히 버린다.

use async_trait::async_trait;
use aurora_core::error::CoreError;
use aurora_core::models::point::parse_reading;
use aurora_core::models::stream::{FilterParams, Transport};
use aurora_core::ports::stream_source::{SourceEvent, StreamSource};
use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

/// SSE 스트림 소스
pub struct SseSource {
    base_url: String,
    client: reqwest::Client,
}

impl SseSource {
    /// 새 SSE 소스 생성
    ///
    /// `client`에는 전체 요청 타임아웃이 없어야 한다 — SSE 연결은
    /// 세션 내내 열려 있다.
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl StreamSource for SseSource {
    fn transport(&self) -> Transport {
        Transport::Sse
    }

    async fn run(
        &self,
        stream_name: &str,
        filter: &FilterParams,
        tx: mpsc::Sender<SourceEvent>,
    ) -> Result<(), CoreError> {
        let url = format!("{}/api/{stream_name}/stream", self.base_url);
        debug!("SSE 연결 시작: {url}");

        let resp = self
            .client
            .get(&url)
            .query(&filter.to_query())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("SSE 연결 실패: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Api {
                status: status.as_u16(),
                message: format!("SSE 구독 거부: {stream_name}"),
            });
        }

        if tx.send(SourceEvent::Opened).await.is_err() {
            return Ok(());
        }

        let mut events = resp.bytes_stream().eventsource();

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    // keepalive 주석은 파서가 걸러낸다; 빈 data는 여기서 거른다
                    if event.data.is_empty() {
                        continue;
                    }

                    let raw: serde_json::Value = match serde_json::from_str(&event.data) {
                        Ok(v) => v,
                        Err(e) => {
                            debug!("SSE 페이로드 JSON 파싱 실패, 폐기: {e}");
                            continue;
                        }
                    };

                    match parse_reading(&raw) {
                        Ok(point) => {
                            if tx.send(SourceEvent::Point(point)).await.is_err() {
                                debug!("수신 측 종료, SSE 연결 닫음: {stream_name}");
                                return Ok(());
                            }
                        }
                        Err(reason) => debug!("잘못된 측정점 폐기: {reason}"),
                    }
                }
                Err(e) => {
                    return Err(CoreError::Network(format!("SSE 스트림 에러: {e}")));
                }
            }
        }

        debug!("SSE 스트림 종료: {stream_name}");
        Ok(())
    }
}
