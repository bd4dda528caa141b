//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `postwatch_`
//! - 모듈명: `tail_`, `tracker_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(postwatch_core::metrics::TAIL_LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 로테이션 종류 레이블 키 (replaced, truncated, recreated)
pub const LABEL_ROTATION: &str = "rotation";

// ─── File Tailer 메트릭 ─────────────────────────────────────────────

/// Tailer: 읽은 전체 라인 수 (counter)
pub const TAIL_LINES_READ_TOTAL: &str = "postwatch_tail_lines_read_total";

/// Tailer: 따라간 파일 로테이션 수 (counter, label: rotation)
pub const TAIL_ROTATIONS_TOTAL: &str = "postwatch_tail_rotations_total";

// ─── Tracker 메트릭 ─────────────────────────────────────────────────

/// Tracker: 추출 규칙에 매칭된 라인 수 (counter)
pub const TRACKER_LINES_MATCHED_TOTAL: &str = "postwatch_tracker_lines_matched_total";

/// Tracker: 완성된 레코드 수 (counter)
pub const TRACKER_RECORDS_COMPLETED_TOTAL: &str = "postwatch_tracker_records_completed_total";

/// Tracker: 발행된 알림 수 (counter)
pub const TRACKER_NOTIFICATIONS_TOTAL: &str = "postwatch_tracker_notifications_total";

/// Tracker: 중복으로 억제된 알림 수 (counter)
pub const TRACKER_NOTIFICATIONS_SUPPRESSED_TOTAL: &str =
    "postwatch_tracker_notifications_suppressed_total";

/// Tracker: 신뢰하지 않는 발신자로 버려진 레코드 수 (counter)
pub const TRACKER_UNTRUSTED_DROPPED_TOTAL: &str = "postwatch_tracker_untrusted_dropped_total";

/// Tracker: 미완성 테이블에서 밀려난 레코드 수 (counter)
pub const TRACKER_INCOMPLETE_EVICTED_TOTAL: &str = "postwatch_tracker_incomplete_evicted_total";

/// Tracker: 미완성 레코드 수 (gauge)
pub const TRACKER_INCOMPLETE_RECORDS: &str = "postwatch_tracker_incomplete_records";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "postwatch_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `postwatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // File Tailer
    describe_counter!(
        TAIL_LINES_READ_TOTAL,
        "Total number of complete lines read from the watched log file"
    );
    describe_counter!(
        TAIL_ROTATIONS_TOTAL,
        "Total number of log file rotations followed by the tailer"
    );

    // Tracker
    describe_counter!(
        TRACKER_LINES_MATCHED_TOTAL,
        "Total number of lines matched by an extraction pattern"
    );
    describe_counter!(
        TRACKER_RECORDS_COMPLETED_TOTAL,
        "Total number of delivery records completed from a trusted sender"
    );
    describe_counter!(
        TRACKER_NOTIFICATIONS_TOTAL,
        "Total number of completion notifications emitted"
    );
    describe_counter!(
        TRACKER_NOTIFICATIONS_SUPPRESSED_TOTAL,
        "Total number of completions whose status was already notified"
    );
    describe_counter!(
        TRACKER_UNTRUSTED_DROPPED_TOTAL,
        "Total number of complete records dropped for an untrusted sender"
    );
    describe_counter!(
        TRACKER_INCOMPLETE_EVICTED_TOTAL,
        "Total number of incomplete records evicted before completion"
    );
    describe_gauge!(
        TRACKER_INCOMPLETE_RECORDS,
        "Current number of incomplete records awaiting more lines"
    );

    // Daemon
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        TAIL_LINES_READ_TOTAL,
        TAIL_ROTATIONS_TOTAL,
        TRACKER_LINES_MATCHED_TOTAL,
        TRACKER_RECORDS_COMPLETED_TOTAL,
        TRACKER_NOTIFICATIONS_TOTAL,
        TRACKER_NOTIFICATIONS_SUPPRESSED_TOTAL,
        TRACKER_UNTRUSTED_DROPPED_TOTAL,
        TRACKER_INCOMPLETE_EVICTED_TOTAL,
        TRACKER_INCOMPLETE_RECORDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_postwatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("postwatch_"),
                "Metric '{}' does not start with 'postwatch_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES
            .iter()
            .filter(|n| **n != TRACKER_INCOMPLETE_RECORDS && **n != DAEMON_BUILD_INFO)
        {
            assert!(name.ends_with("_total"), "counter '{name}' lacks _total");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더 없이 호출해도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        assert_eq!(LABEL_ROTATION.to_lowercase(), LABEL_ROTATION);
    }
}
