//! 애플리케이션 설정 구조체.
//!
//! 서버 URL, 폴링 주기, 버퍼 용량, backoff 한도 등 런타임 설정을
//! 정의한다. `config_manager`를 통해 파일에서 로드/저장.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 서버 연결 설정
    pub server: ServerConfig,
    /// 스트림 설정
    #[serde(default)]
    pub stream: StreamConfig,
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

// ============================================================
// 서버 설정
// ============================================================

/// 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 백엔드 베이스 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================
// 스트림 설정
// ============================================================

/// 스트림 설정 — 전송 프로브, 폴링 주기, 버퍼, backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 폴링 전송의 조회 주기 (초)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 스트림별 라이브 버퍼 용량 (측정점 수)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// 전송 프로브 타임아웃 (초)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// 재연결 backoff 시작값 (초)
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,
    /// 재연결 backoff 상한 (초)
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// 연속 이 횟수만큼 SSE 수립에 실패하면 폴링으로 강등
    #[serde(default = "default_sse_failure_threshold")]
    pub sse_failure_threshold: u32,
    /// 폴링 소스가 연결 유실로 판단하는 연속 실패 횟수
    #[serde(default = "default_poll_failure_threshold")]
    pub poll_failure_threshold: u32,
    /// 소스 → 연결 이벤트 채널 용량
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            buffer_capacity: default_buffer_capacity(),
            probe_timeout_secs: default_probe_timeout_secs(),
            backoff_initial_secs: default_backoff_initial_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            sse_failure_threshold: default_sse_failure_threshold(),
            poll_failure_threshold: default_poll_failure_threshold(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    /// 폴링 주기를 Duration으로 반환
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 프로브 타임아웃을 Duration으로 반환
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// backoff 시작값을 Duration으로 반환
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs(self.backoff_initial_secs)
    }

    /// backoff 상한을 Duration으로 반환
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

// ============================================================
// 기본값
// ============================================================

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_buffer_capacity() -> usize {
    60
}

fn default_probe_timeout_secs() -> u64 {
    3
}

fn default_backoff_initial_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    30
}

fn default_sse_failure_threshold() -> u32 {
    3
}

fn default_poll_failure_threshold() -> u32 {
    3
}

fn default_channel_capacity() -> usize {
    64
}
