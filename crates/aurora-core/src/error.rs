//! AuroraSense 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 실패를 `CoreError`로 매핑하여 반환한다.
//! 스트림 레이어의 실패는 예외로 전파되지 않고 상태 데이터(phase/last_error)로
//! 표현되므로, 이 타입은 요청/응답 경계에서만 호출자에게 노출된다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 네트워크 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// API 응답 에러 (2xx 이외의 상태 코드)
    #[error("API 에러 ({status}): {message}")]
    Api {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문 또는 진단 메시지
        message: String,
    },

    /// 리소스를 찾을 수 없음 (404)
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Stream", "Reading")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}
