//! 추적 엔진 설정
//!
//! [`TrackerConfig`]는 core의 [`TailConfig`](postwatch_core::config::TailConfig)와
//! [`TrackerSection`](postwatch_core::config::TrackerSection)을 합쳐
//! 엔진 내부에서 사용하는 런타임 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use postwatch_core::config::PostwatchConfig;
//! use postwatch_tracker::config::TrackerConfig;
//!
//! let core_config = PostwatchConfig::default();
//! let config = TrackerConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use postwatch_core::config::PostwatchConfig;

use crate::error::TrackerError;

/// 추적 엔진 설정
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// 감시할 로그 파일 경로 (`~` 확장 완료)
    pub log_file: PathBuf,
    /// 새 라인이 없을 때 재시도 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 로테이션 대기 제한 (초, 0 = 무제한)
    pub rotation_wait_timeout_secs: u64,
    /// 추출 패턴 (설정 순서 유지)
    pub patterns: Vec<String>,
    /// 신뢰하는 발신자
    pub froms: Vec<String>,
    /// 완료 이력 최대 보관 수
    pub history: usize,
    /// 미완성 레코드 테이블 최대 크기
    pub incomplete_capacity: usize,
    /// 중복 알림 억제 원장 최대 크기
    pub dedup_capacity: usize,
    /// 이력 조회 최대 결과 수
    pub query_limit: usize,
    /// 알림 라인 템플릿
    pub log_line: String,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// tailer -> 처리 태스크 라인 채널 용량
    pub line_channel_capacity: usize,
    /// 이력 조회 요청 채널 용량
    pub query_channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("/var/log/exim4/mainlog"),
            poll_interval_ms: 100,
            rotation_wait_timeout_secs: 0,
            patterns: Vec::new(),
            froms: Vec::new(),
            history: 100,
            incomplete_capacity: 8,
            dedup_capacity: 1024,
            query_limit: 3,
            log_line: "{email} is {status}: {reason}".to_owned(),
            line_channel_capacity: 1024,
            query_channel_capacity: 16,
        }
    }
}

impl TrackerConfig {
    /// core 설정의 `[tail]`, `[tracker]` 섹션에서 엔진 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &PostwatchConfig) -> Self {
        Self {
            log_file: core.tail.resolved_log_file(),
            poll_interval_ms: core.tail.poll_interval_ms,
            rotation_wait_timeout_secs: core.tail.rotation_wait_timeout_secs,
            patterns: core.tracker.patterns.clone(),
            froms: core.tracker.froms.clone(),
            history: core.tracker.history,
            incomplete_capacity: core.tracker.incomplete_capacity,
            dedup_capacity: core.tracker.dedup_capacity,
            query_limit: core.tracker.query_limit,
            log_line: core.tracker.log_line.clone(),
            ..Self::default()
        }
    }

    /// 폴링 간격
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 로테이션 대기 제한 (`None` = 무제한)
    pub fn rotation_wait_timeout(&self) -> Option<Duration> {
        (self.rotation_wait_timeout_secs > 0)
            .then(|| Duration::from_secs(self.rotation_wait_timeout_secs))
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 패턴과 템플릿의 문법은 엔진 생성 시 컴파일하면서 검증됩니다.
    pub fn validate(&self) -> Result<(), TrackerError> {
        const MAX_POLL_INTERVAL_MS: u64 = 60_000;
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        if self.log_file.as_os_str().is_empty() {
            return Err(config_error("log_file", "must not be empty"));
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(config_error(
                "poll_interval_ms",
                format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if self.patterns.is_empty() {
            return Err(config_error(
                "patterns",
                "at least one extraction pattern must be configured",
            ));
        }

        if self.froms.is_empty() {
            return Err(config_error(
                "froms",
                "at least one trusted sender must be configured",
            ));
        }

        for (field, value) in [
            ("history", self.history),
            ("incomplete_capacity", self.incomplete_capacity),
            ("dedup_capacity", self.dedup_capacity),
            ("query_limit", self.query_limit),
        ] {
            if value == 0 {
                return Err(config_error(field, "must be greater than 0"));
            }
        }

        for (field, value) in [
            ("line_channel_capacity", self.line_channel_capacity),
            ("query_channel_capacity", self.query_channel_capacity),
        ] {
            if value == 0 || value > MAX_CHANNEL_CAPACITY {
                return Err(config_error(
                    field,
                    format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
                ));
            }
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> TrackerError {
    TrackerError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 추적 엔진 설정 빌더
#[derive(Default)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시할 로그 파일 경로를 설정합니다.
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file = path.into();
        self
    }

    /// 폴링 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 로테이션 대기 제한(초)을 설정합니다.
    pub fn rotation_wait_timeout_secs(mut self, secs: u64) -> Self {
        self.config.rotation_wait_timeout_secs = secs;
        self
    }

    /// 추출 패턴을 설정합니다.
    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// 신뢰하는 발신자를 설정합니다.
    pub fn froms<I, S>(mut self, froms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.froms = froms.into_iter().map(Into::into).collect();
        self
    }

    /// 완료 이력 크기를 설정합니다.
    pub fn history(mut self, history: usize) -> Self {
        self.config.history = history;
        self
    }

    /// 미완성 테이블 크기를 설정합니다.
    pub fn incomplete_capacity(mut self, capacity: usize) -> Self {
        self.config.incomplete_capacity = capacity;
        self
    }

    /// 중복 억제 원장 크기를 설정합니다.
    pub fn dedup_capacity(mut self, capacity: usize) -> Self {
        self.config.dedup_capacity = capacity;
        self
    }

    /// 이력 조회 최대 결과 수를 설정합니다.
    pub fn query_limit(mut self, limit: usize) -> Self {
        self.config.query_limit = limit;
        self
    }

    /// 알림 라인 템플릿을 설정합니다.
    pub fn log_line(mut self, template: impl Into<String>) -> Self {
        self.config.log_line = template.into();
        self
    }

    /// 라인 채널 용량을 설정합니다.
    pub fn line_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.line_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `TrackerConfig`를 생성합니다.
    pub fn build(self) -> Result<TrackerConfig, TrackerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
