//! 측정점 모델.
//!
//! 센서 스트림의 단일 타임스탬프 관측값과, 수신 JSON을 검증하는
//! 파싱 단계를 정의한다. 스트림 연결은 검증을 통과한 `MetricPoint`만
//! 다루며 원시 JSON을 직접 보지 않는다.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// 단일 측정점 — 하나의 타임스탬프에 대한 지표값 묶음
///
/// `fields`는 지표 이름("snr", "latency_ms", "downlink_bps" 등) →
/// 측정값 매핑. 서버가 보내지 않았거나 null인 지표는 키 자체가 없다
/// (0으로 채우지 않음).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// 측정 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 지표 이름 → 측정값
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

impl MetricPoint {
    /// 지표값 없이 생성
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// epoch 밀리초로 생성 (주로 테스트 편의용)
    ///
    /// 범위를 벗어나는 밀리초는 epoch 0으로 간주한다.
    pub fn at_ms(epoch_ms: i64) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(epoch_ms)
            .single()
            .unwrap_or_default();
        Self::at(timestamp)
    }

    /// 지표값 추가 (빌더 스타일)
    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// 지표값 조회
    pub fn value(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// 타임스탬프를 epoch 밀리초로 반환
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// 수신 JSON 검증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadingError {
    /// 페이로드가 JSON 객체가 아님
    #[error("JSON 객체가 아님")]
    NotObject,

    /// 필수 timestamp 필드 누락
    #[error("timestamp 필드 누락")]
    MissingTimestamp,

    /// timestamp 형식 오류 (ISO8601 문자열 또는 epoch 밀리초가 아님)
    #[error("timestamp 형식 오류: {0}")]
    InvalidTimestamp(String),

    /// 숫자도 null도 아닌 지표값
    #[error("숫자가 아닌 지표값: {field}")]
    NonNumericField {
        /// 문제가 된 지표 이름
        field: String,
    },
}

/// 수신 JSON 객체를 `MetricPoint`로 파싱
///
/// 허용하는 timestamp 표현:
/// - ISO8601/RFC3339 문자열 (`"2026-08-07T12:00:00Z"`, 오프셋 포함 허용)
/// - epoch 밀리초 숫자
///
/// timestamp 이외의 키는 지표로 취급한다. 값이 숫자면 채택, null이면
/// 생략, 그 외 타입이면 측정점 전체를 거부한다.
pub fn parse_reading(value: &serde_json::Value) -> Result<MetricPoint, ReadingError> {
    let obj = value.as_object().ok_or(ReadingError::NotObject)?;

    let raw_ts = obj.get("timestamp").ok_or(ReadingError::MissingTimestamp)?;
    let timestamp = parse_timestamp(raw_ts)?;

    let mut fields = BTreeMap::new();
    for (key, val) in obj {
        if key == "timestamp" {
            continue;
        }
        match val {
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    fields.insert(key.clone(), v);
                }
            }
            // null 지표는 결측으로 간주하고 생략
            serde_json::Value::Null => {}
            _ => {
                return Err(ReadingError::NonNumericField { field: key.clone() });
            }
        }
    }

    Ok(MetricPoint { timestamp, fields })
}

/// timestamp 값 파싱 (문자열 또는 숫자)
fn parse_timestamp(value: &serde_json::Value) -> Result<DateTime<Utc>, ReadingError> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ReadingError::InvalidTimestamp(format!("{s}: {e}"))),
        serde_json::Value::Number(n) => {
            let ms = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| ReadingError::InvalidTimestamp(n.to_string()))?;
            Utc.timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| ReadingError::InvalidTimestamp(format!("{ms}ms")))
        }
        other => Err(ReadingError::InvalidTimestamp(other.to_string())),
    }
}
