//! 파이프라인 trait -- 모듈 생명주기 정의

use std::future::Future;

use crate::error::PostwatchError;

/// 모듈 상태 점검 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작 중이지만 일부 기능이 제한됨
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 시작/정지/상태 점검 생명주기를 가지는 모듈
///
/// 데몬은 이 trait으로 모듈을 동일한 방식으로 관리합니다.
pub trait Pipeline {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), PostwatchError>>;

    /// 백그라운드 태스크를 정지하고 자원을 해제합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), PostwatchError>>;

    /// 현재 상태를 점검합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus>;
}
