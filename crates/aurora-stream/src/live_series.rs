//! 뷰용 라이브 시계열.
//!
//! 차트 하나가 소비하는 데이터 계약: 한 번 조회한 과거 구간 + 연결
//! 하나의 라이브 버퍼. 버퍼 알림이 올 때마다 명시적으로 `current()`를
//! 다시 호출해 병합을 재계산한다 — 암묵적 의존성 추적이 아니라 구독/
//! 재계산 패턴이다.

use aurora_core::error::CoreError;
use aurora_core::models::point::MetricPoint;
use aurora_core::models::series::MergedSeries;
use aurora_core::models::stream::StreamState;
use aurora_core::ports::metrics_api::MetricsApi;
use std::sync::Arc;
use tokio::sync::watch;

use crate::buffer::merge_series;
use crate::connection::StreamConnection;

/// 과거 구간 + 라이브 버퍼를 묶은 뷰 데이터 계약
///
/// 과거 구간은 생성 시 한 번만 조회한다. 조회 실패는 해당 차트의
/// 에러 상태일 뿐, 같은 스트림의 라이브 수신에는 영향이 없다.
pub struct LiveSeries {
    connection: Arc<StreamConnection>,
    historical: Vec<MetricPoint>,
}

impl LiveSeries {
    /// 과거 구간을 조회해서 생성
    pub async fn load(
        api: &dyn MetricsApi,
        connection: Arc<StreamConnection>,
        hours: u32,
    ) -> Result<Self, CoreError> {
        let historical = api
            .timeseries(connection.name(), hours, connection.filter())
            .await?;
        Ok(Self::with_history(connection, historical))
    }

    /// 이미 조회한 과거 구간으로 생성
    pub fn with_history(connection: Arc<StreamConnection>, historical: Vec<MetricPoint>) -> Self {
        Self {
            connection,
            historical,
        }
    }

    /// 현재 병합 시계열 — 순수 재계산, 입력을 변경하지 않는다
    pub fn current(&self) -> MergedSeries {
        merge_series(&self.historical, &self.connection.snapshot())
    }

    /// 버퍼 변경 알림 구독 — 알림이 오면 `current()`를 다시 호출한다
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.connection.subscribe_points()
    }

    /// 연결 상태 (상태 배지용)
    pub fn state(&self) -> StreamState {
        self.connection.state()
    }

    /// 과거 구간 (조회 시점 그대로)
    pub fn historical(&self) -> &[MetricPoint] {
        &self.historical
    }
}
