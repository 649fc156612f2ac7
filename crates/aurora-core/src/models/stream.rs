//! 스트림 상태 모델.
//!
//! 스트림 이름별 전송 방식/연결 단계와, 대시보드 배지가 소비하는
//! 집계 요약을 정의한다.

use serde::{Deserialize, Serialize};

/// 전송 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transport {
    /// Server-Sent Events 푸시
    Sse,
    /// 주기적 latest 폴링
    Polling,
    /// 연결 없음
    None,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Sse => write!(f, "SSE"),
            Transport::Polling => write!(f, "Polling"),
            Transport::None => write!(f, "None"),
        }
    }
}

/// 연결 단계
///
/// 전이는 스트림 연결 태스크만 수행한다:
/// `Disconnected → Connecting → Connected → {Disconnected, Error}`,
/// `Error → Connecting` (자동 backoff 또는 수동 reconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamPhase {
    /// 연결 해제됨 (정상 종료 포함)
    Disconnected,
    /// 연결 시도 중
    Connecting,
    /// 연결됨 — 측정점 수신 가능
    Connected,
    /// 실패 — backoff 후 자동 재시도 예정
    Error,
}

impl std::fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamPhase::Disconnected => write!(f, "Disconnected"),
            StreamPhase::Connecting => write!(f, "Connecting"),
            StreamPhase::Connected => write!(f, "Connected"),
            StreamPhase::Error => write!(f, "Error"),
        }
    }
}

/// 스트림별 연결 상태 — 소비자에게 watch 채널로 브로드캐스트된다
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// 스트림 식별자 (예: "starlink", "gps")
    pub stream_name: String,
    /// 현재 전송 방식
    pub transport: Transport,
    /// 현재 연결 단계
    pub phase: StreamPhase,
    /// 마지막 실패 진단 메시지
    pub last_error: Option<String>,
}

impl StreamState {
    /// 초기 상태 (연결 없음)
    pub fn new(stream_name: &str) -> Self {
        Self {
            stream_name: stream_name.to_string(),
            transport: Transport::None,
            phase: StreamPhase::Disconnected,
            last_error: None,
        }
    }
}

/// 관리 중인 스트림 집합의 요약 — 상태 배지 렌더링용
///
/// `connected == sse + polling` (연결된 스트림만 전송 방식별로 센다).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// 등록된 스트림 수
    pub total: usize,
    /// Connected 단계인 스트림 수
    pub connected: usize,
    /// SSE로 연결된 스트림 수
    pub sse: usize,
    /// 폴링으로 연결된 스트림 수
    pub polling: usize,
}

/// 스트림/조회 공통 필터 파라미터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// 클라이언트(설치 지점) 필터
    #[serde(default)]
    pub client_id: Option<String>,
    /// 개별 디바이스 필터
    #[serde(default)]
    pub device_id: Option<String>,
}

impl FilterParams {
    /// 쿼리 스트링 파라미터로 변환 (설정된 필드만)
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }
        if let Some(device_id) = &self.device_id {
            query.push(("device_id", device_id.clone()));
        }
        query
    }
}
