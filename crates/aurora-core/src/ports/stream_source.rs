//! 스트림 소스 포트.
//!
//! 전송 방식(SSE/폴링)을 전략 인터페이스 하나로 추상화한다.
//! 스트림 연결은 이 trait만 다루며, 어떤 전송이 선택되었는지에 따라
//! 분기하지 않는다. 구현: `aurora-stream` (SseSource, PollSource)

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::models::point::MetricPoint;
use crate::models::stream::{FilterParams, Transport};

/// 소스가 연결 태스크로 보내는 이벤트
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// 전송 수립됨 — 연결 단계를 Connected로 올려도 된다
    Opened,
    /// 검증을 통과한 측정점 수신
    Point(MetricPoint),
}

/// 단일 스트림 전송 전략
///
/// `run`은 한 번의 연결 수명을 수행한다:
/// - 수립 시 `SourceEvent::Opened`를 보내고, 이후 측정점을 `tx`로 보낸다.
/// - 수신 측이 사라지면(`tx` 닫힘) `Ok(())`로 조용히 끝난다.
/// - 연결 수립 실패·전송 중 유실은 `Err`로 끝난다. 재시도는 소스가 아니라
///   스트림 연결의 몫이다.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// 이 소스의 전송 방식
    fn transport(&self) -> Transport;

    /// 단일 연결 수행
    async fn run(
        &self,
        stream_name: &str,
        filter: &FilterParams,
        tx: mpsc::Sender<SourceEvent>,
    ) -> Result<(), CoreError>;
}
