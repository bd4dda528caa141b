//! 조회/알림 파사드 -- 추적 엔진을 외부 협력자에게 노출합니다.
//!
//! [`Tracker`]는 패턴 엔진, 누적기, 템플릿을 묶어 라인 단위 처리와
//! 주소별 이력 조회를 제공합니다. 완성 이벤트는 [`CompletionSink`]로 전달됩니다.

use chrono::{DateTime, Utc};
use metrics::counter;
use postwatch_core::metrics as m;

use crate::accumulator::{Accumulator, Completion};
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::history::CompletionCache;
use crate::ledger::DedupLedger;
use crate::pattern::PatternEngine;
use crate::record::CompletedRecord;
use crate::template::LogLineTemplate;

/// 완성 이벤트를 받는 협력자
///
/// 완성된 레코드마다 `on_completed`가 한 번 호출되며,
/// 알림 대상인 경우에만 렌더링된 라인으로 `emit_log_line`이 이어서 호출됩니다.
pub trait CompletionSink: Send + 'static {
    /// 레코드가 완성되었을 때 호출됩니다.
    fn on_completed(&mut self, record: &CompletedRecord, notify: bool);

    /// 알림 라인을 내보냅니다.
    fn emit_log_line(&mut self, line: &str);
}

/// 추적 엔진 파사드
pub struct Tracker {
    patterns: PatternEngine,
    accumulator: Accumulator,
    template: LogLineTemplate,
    query_limit: usize,
}

impl Tracker {
    /// 설정에서 엔진을 생성합니다.
    ///
    /// 패턴이나 템플릿이 잘못되었으면 tail을 시작하기 전에 실패합니다.
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let patterns = PatternEngine::compile(&config.patterns)?;
        let template = LogLineTemplate::parse(&config.log_line)?;
        let accumulator = Accumulator::new(
            config.froms.iter().cloned(),
            config.incomplete_capacity,
            DedupLedger::new(config.dedup_capacity),
            CompletionCache::new(config.history),
        );

        Ok(Self {
            patterns,
            accumulator,
            template,
            query_limit: config.query_limit,
        })
    }

    /// 한 라인을 처리하고 완성 이벤트를 싱크로 전달합니다.
    pub fn process_line(&mut self, line: &str, sink: &mut dyn CompletionSink) -> Option<Completion> {
        self.process_line_at(line, Utc::now(), sink)
    }

    /// `now`를 현재 시각으로 사용해 한 라인을 처리합니다.
    pub fn process_line_at(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
        sink: &mut dyn CompletionSink,
    ) -> Option<Completion> {
        let captures = self.patterns.match_line(line)?;
        counter!(m::TRACKER_LINES_MATCHED_TOTAL).increment(1);

        let completion = self.accumulator.ingest_at(captures, now)?;
        sink.on_completed(&completion.record, completion.notify);
        if completion.notify {
            sink.emit_log_line(&self.render_log_line(&completion.record));
        }
        Some(completion)
    }

    /// 알림 라인을 렌더링합니다.
    pub fn render_log_line(&self, record: &CompletedRecord) -> String {
        self.template.render(record)
    }

    /// 주소의 이력을 최신순으로 최대 `query_limit`개 반환합니다.
    pub fn history(&self, address: &str) -> Vec<&CompletedRecord> {
        self.accumulator.history().query(address, self.query_limit)
    }

    /// `emailstate` 명령에 대한 응답 라인을 만듭니다.
    ///
    /// `args`의 첫 단어를 주소로 사용합니다.
    pub fn email_state(&self, args: &str, now: DateTime<Utc>) -> Vec<String> {
        let Some(address) = args.split_whitespace().next() else {
            return vec!["Please provide an email address".to_owned()];
        };

        let found = self.history(address);
        if found.is_empty() {
            return vec![format!("I don't have {address} in my history")];
        }
        found.into_iter().map(|r| render_entry(r, now)).collect()
    }

    /// 누적기
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// 패턴 엔진
    pub fn patterns(&self) -> &PatternEngine {
        &self.patterns
    }
}

/// 이력 항목 한 줄을 렌더링합니다.
///
/// 형식: `2024-01-15T12:00:00 (2d3h ago) a@example.com is bounced: mailbox full`
pub fn render_entry(record: &CompletedRecord, now: DateTime<Utc>) -> String {
    let elapsed = (now - record.created_at).num_seconds().max(0) as u64;
    format!(
        "{} ({} ago) {} is {}: {}",
        record.created_at.format("%Y-%m-%dT%H:%M:%S"),
        human_duration(elapsed),
        record.to,
        record.status,
        record.reason,
    )
}

/// 초를 사람이 읽기 쉬운 문자열로 변환합니다.
///
/// 주/일/시/분/초 중 0이 아닌 가장 큰 두 단위를 사용합니다 (예: `2d3h`, `1w5m`).
pub fn human_duration(total_secs: u64) -> String {
    const UNITS: [(u64, char); 5] = [
        (7 * 24 * 60 * 60, 'w'),
        (24 * 60 * 60, 'd'),
        (60 * 60, 'h'),
        (60, 'm'),
        (1, 's'),
    ];

    let mut remaining = total_secs;
    let mut out = String::new();
    let mut used = 0;
    for (size, suffix) in UNITS {
        let count = remaining / size;
        remaining %= size;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push(suffix);
            used += 1;
            if used == 2 {
                break;
            }
        }
    }

    if out.is_empty() {
        out.push_str("0s");
    }
    out
}
