//! 추적 엔진 에러 타입
//!
//! [`TrackerError`]는 추적 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<TrackerError> for PostwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use postwatch_core::error::{PipelineError, PostwatchError};

/// 추적 엔진 도메인 에러
///
/// 패턴 컴파일, 템플릿 파싱, 설정 검증, 파일 tail, 채널 통신 등
/// 엔진 내부의 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// 추출 패턴 컴파일 실패
    #[error("pattern[{index}] compile error: {reason}")]
    PatternCompile {
        /// 설정 내 패턴 순번
        index: usize,
        /// 실패 사유
        reason: String,
    },

    /// 허용되지 않은 이름의 캡처 그룹
    #[error("pattern[{index}] uses unknown capture group '{field}' (allowed: id, to, from, status, reason)")]
    PatternField {
        /// 설정 내 패턴 순번
        index: usize,
        /// 문제가 된 그룹 이름
        field: String,
    },

    /// 알림 라인 템플릿 파싱 실패
    #[error("log line template error: {reason}")]
    Template {
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 tail 에러
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 감시 중인 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TrackerError> for PostwatchError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Io(io) => PostwatchError::Io(io),
            TrackerError::Channel(reason) => {
                PostwatchError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => PostwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
