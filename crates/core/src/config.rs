//! 설정 관리 -- postwatch.toml 파싱 및 런타임 설정
//!
//! [`PostwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`POSTWATCH_TAIL_LOG_FILE=/var/log/exim4/mainlog` 형식)
//! 3. 설정 파일 (`postwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), postwatch_core::error::PostwatchError> {
//! use postwatch_core::config::PostwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PostwatchConfig::load("postwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PostwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PostwatchError};

/// postwatch 통합 설정
///
/// `postwatch.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 파일 감시 설정
    #[serde(default)]
    pub tail: TailConfig,
    /// 이벤트 추출/상관 분석 설정
    #[serde(default)]
    pub tracker: TrackerSection,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl PostwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PostwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PostwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PostwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PostwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PostwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            PostwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `POSTWATCH_{SECTION}_{FIELD}`
    /// 예: `POSTWATCH_TRACKER_HISTORY=200`
    ///
    /// 추출 패턴(`tracker.patterns`)은 쉼표를 포함할 수 있으므로 오버라이드하지 않습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "POSTWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "POSTWATCH_GENERAL_LOG_FORMAT");

        // Tail
        override_string(&mut self.tail.log_file, "POSTWATCH_TAIL_LOG_FILE");
        override_u64(
            &mut self.tail.poll_interval_ms,
            "POSTWATCH_TAIL_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.tail.rotation_wait_timeout_secs,
            "POSTWATCH_TAIL_ROTATION_WAIT_TIMEOUT_SECS",
        );

        // Tracker
        override_csv(&mut self.tracker.froms, "POSTWATCH_TRACKER_FROMS");
        override_usize(&mut self.tracker.history, "POSTWATCH_TRACKER_HISTORY");
        override_usize(
            &mut self.tracker.incomplete_capacity,
            "POSTWATCH_TRACKER_INCOMPLETE_CAPACITY",
        );
        override_usize(
            &mut self.tracker.dedup_capacity,
            "POSTWATCH_TRACKER_DEDUP_CAPACITY",
        );
        override_usize(&mut self.tracker.query_limit, "POSTWATCH_TRACKER_QUERY_LIMIT");
        override_string(&mut self.tracker.log_line, "POSTWATCH_TRACKER_LOG_LINE");

        // Metrics
        override_bool(&mut self.metrics.enabled, "POSTWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "POSTWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "POSTWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 추출 패턴의 정규식 컴파일은 `postwatch-tracker`가 시작 시점에 수행합니다.
    pub fn validate(&self) -> Result<(), PostwatchError> {
        const MAX_POLL_INTERVAL_MS: u64 = 60_000;
        const MAX_HISTORY: usize = 100_000;
        const MAX_INCOMPLETE_CAPACITY: usize = 4_096;
        const MAX_DEDUP_CAPACITY: usize = 1_000_000;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.tail.log_file.trim().is_empty() {
            return Err(invalid("tail.log_file", "must not be empty"));
        }

        if self.tail.poll_interval_ms == 0 || self.tail.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(invalid(
                "tail.poll_interval_ms",
                format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if self.tracker.patterns.is_empty() {
            return Err(invalid(
                "tracker.patterns",
                "at least one extraction pattern must be configured",
            ));
        }

        if self.tracker.froms.is_empty() {
            return Err(invalid(
                "tracker.froms",
                "at least one trusted sender must be configured",
            ));
        }

        if self.tracker.history == 0 || self.tracker.history > MAX_HISTORY {
            return Err(invalid("tracker.history", format!("must be 1-{MAX_HISTORY}")));
        }

        if self.tracker.incomplete_capacity == 0
            || self.tracker.incomplete_capacity > MAX_INCOMPLETE_CAPACITY
        {
            return Err(invalid(
                "tracker.incomplete_capacity",
                format!("must be 1-{MAX_INCOMPLETE_CAPACITY}"),
            ));
        }

        if self.tracker.dedup_capacity == 0 || self.tracker.dedup_capacity > MAX_DEDUP_CAPACITY {
            return Err(invalid(
                "tracker.dedup_capacity",
                format!("must be 1-{MAX_DEDUP_CAPACITY}"),
            ));
        }

        if self.tracker.query_limit == 0 {
            return Err(invalid("tracker.query_limit", "must be greater than 0"));
        }

        if self.tracker.log_line.is_empty() {
            return Err(invalid("tracker.log_line", "must not be empty"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> PostwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 로그 파일 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// 감시할 MTA 전달 로그 경로 (`~`는 `$HOME`으로 확장)
    pub log_file: String,
    /// 새 라인이 없을 때 재시도 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 로테이션 후 파일이 다시 나타나기를 기다리는 최대 시간 (초, 0 = 무제한)
    pub rotation_wait_timeout_secs: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            log_file: "/var/log/exim4/mainlog".to_owned(),
            poll_interval_ms: 100,
            rotation_wait_timeout_secs: 0,
        }
    }
}

impl TailConfig {
    /// `~` 접두어를 `$HOME`으로 확장한 로그 파일 경로를 반환합니다.
    pub fn resolved_log_file(&self) -> PathBuf {
        expand_home(&self.log_file)
    }
}

/// 이벤트 추출/상관 분석 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    /// 추출 패턴 목록 (설정 순서대로 시도, 첫 매칭 우선)
    ///
    /// 이름 있는 그룹은 `id`, `to`, `from`, `status`, `reason`만 허용됩니다.
    pub patterns: Vec<String>,
    /// 신뢰하는 발신자 목록
    pub froms: Vec<String>,
    /// 완료 이력 최대 보관 수
    pub history: usize,
    /// 미완성 레코드 테이블 최대 크기
    pub incomplete_capacity: usize,
    /// 중복 알림 억제 원장의 최대 크기
    pub dedup_capacity: usize,
    /// 이력 조회 시 반환할 최대 항목 수
    pub query_limit: usize,
    /// 알림 라인 템플릿 (`{email}`, `{status}`, `{reason}`)
    pub log_line: String,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            froms: Vec::new(),
            history: 100,
            incomplete_capacity: 8,
            dedup_capacity: 1024,
            query_limit: 3,
            log_line: "{email} is {status}: {reason}".to_owned(),
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9102,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(path.trim_start_matches('~').trim_start_matches('/'));
        }
        warn!(path, "HOME is not set, using log file path as-is");
    }
    PathBuf::from(path)
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
