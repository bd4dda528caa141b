//! 레코드 누적기 -- 부분 캡처를 상관 ID별 레코드로 병합합니다.
//!
//! [`Accumulator`]는 미완성 레코드 테이블(LRU, 크기 제한)을 소유하며,
//! 레코드가 완성되면 신뢰 발신자 검사, 중복 알림 판정, 이력 저장을 차례로 수행합니다.
//!
//! # 처리 순서
//! 1. 상관 ID 결정 (캡처에 없으면 합성, 단독 레코드로 취급)
//! 2. 미완성 테이블에서 조회 또는 생성 (터치)
//! 3. 캡처된 필드 덮어쓰기
//! 4. 완성 여부 확인
//! 5. 완성 시: 테이블에서 제거 -> 신뢰 발신자 검사 -> 원장 확인 -> 이력 저장

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use postwatch_core::metrics as m;

use crate::bounded::BoundedLru;
use crate::history::CompletionCache;
use crate::ledger::DedupLedger;
use crate::pattern::Captures;
use crate::record::{CompletedRecord, PartialRecord};

/// 완성 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// 완성된 레코드
    pub record: CompletedRecord,
    /// 알림 대상 여부 (`false`면 이력만 기록)
    pub notify: bool,
}

/// 레코드 누적기
pub struct Accumulator {
    /// 상관 ID -> 미완성 레코드
    incomplete: BoundedLru<String, PartialRecord>,
    /// 신뢰하는 발신자
    trusted: HashSet<String>,
    ledger: DedupLedger,
    history: CompletionCache,
    /// 완성된 총 레코드 수
    total_completed: u64,
    /// 신뢰하지 않는 발신자로 버려진 수
    untrusted_dropped: u64,
    /// 미완성 상태로 밀려난 수
    evicted: u64,
}

impl Accumulator {
    /// 새 누적기를 생성합니다.
    ///
    /// 원장과 이력은 호출자가 만들어 주입합니다.
    pub fn new(
        trusted: impl IntoIterator<Item = impl Into<String>>,
        incomplete_capacity: usize,
        ledger: DedupLedger,
        history: CompletionCache,
    ) -> Self {
        Self {
            incomplete: BoundedLru::new(incomplete_capacity),
            trusted: trusted.into_iter().map(Into::into).collect(),
            ledger,
            history,
            total_completed: 0,
            untrusted_dropped: 0,
            evicted: 0,
        }
    }

    /// 현재 시각 기준으로 캡처를 병합합니다.
    pub fn ingest(&mut self, captures: Captures) -> Option<Completion> {
        self.ingest_at(captures, Utc::now())
    }

    /// 캡처를 병합하고, 레코드가 완성되면 결과를 반환합니다.
    ///
    /// `now`는 새 레코드의 `created_at`이 됩니다.
    pub fn ingest_at(&mut self, captures: Captures, now: DateTime<Utc>) -> Option<Completion> {
        let Some(id) = captures.id.clone() else {
            return self.ingest_standalone(&captures, now);
        };

        let (record, evicted) = self
            .incomplete
            .touch_or_insert_with(id.clone(), || PartialRecord::new(id.clone(), now));
        record.merge(&captures);
        let finalized = record.is_finalized();

        if let Some((evicted_id, partial)) = evicted {
            self.evicted += 1;
            counter!(m::TRACKER_INCOMPLETE_EVICTED_TOTAL).increment(1);
            tracing::debug!(
                id = %evicted_id,
                created_at = %partial.created_at,
                "evicted incomplete record"
            );
        }

        if !finalized {
            tracing::debug!(id = %id, "merged partial record");
            gauge!(m::TRACKER_INCOMPLETE_RECORDS).set(self.incomplete.len() as f64);
            return None;
        }

        let partial = self.incomplete.remove(id.as_str())?;
        gauge!(m::TRACKER_INCOMPLETE_RECORDS).set(self.incomplete.len() as f64);
        let record = partial.finalize().ok()?;
        self.complete(record, true)
    }

    /// 상관 ID가 없는 캡처는 한 라인으로 완성되는 단독 레코드로 취급합니다.
    ///
    /// 테이블에 들어가지 않으며 원장도 거치지 않습니다.
    fn ingest_standalone(&mut self, captures: &Captures, now: DateTime<Utc>) -> Option<Completion> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut partial = PartialRecord::new(id, now);
        partial.merge(captures);

        match partial.finalize() {
            Ok(record) => self.complete(record, false),
            Err(partial) => {
                tracing::debug!(
                    id = %partial.id,
                    "discarded incomplete record without correlation id"
                );
                None
            }
        }
    }

    fn complete(&mut self, record: CompletedRecord, use_ledger: bool) -> Option<Completion> {
        if !self.trusted.contains(&record.from) {
            self.untrusted_dropped += 1;
            counter!(m::TRACKER_UNTRUSTED_DROPPED_TOTAL).increment(1);
            tracing::debug!(
                id = %record.id,
                from = %record.from,
                "dropped record from untrusted sender"
            );
            return None;
        }

        let notify = !use_ledger || self.ledger.should_notify(&record.id, &record.status);
        if notify {
            counter!(m::TRACKER_NOTIFICATIONS_TOTAL).increment(1);
        } else {
            counter!(m::TRACKER_NOTIFICATIONS_SUPPRESSED_TOTAL).increment(1);
            tracing::debug!(
                id = %record.id,
                status = %record.status,
                "suppressed duplicate notification"
            );
        }

        self.total_completed += 1;
        counter!(m::TRACKER_RECORDS_COMPLETED_TOTAL).increment(1);
        self.history.push(&record.to, record.clone());

        Some(Completion { record, notify })
    }

    /// 완료 이력
    pub fn history(&self) -> &CompletionCache {
        &self.history
    }

    /// 중복 알림 억제 원장
    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    /// 현재 미완성 레코드 수
    pub fn incomplete_len(&self) -> usize {
        self.incomplete.len()
    }

    /// 미완성 레코드를 조회합니다 (터치하지 않음).
    pub fn incomplete(&self, id: &str) -> Option<&PartialRecord> {
        self.incomplete.peek(id)
    }

    /// 완성된 총 레코드 수
    pub fn total_completed(&self) -> u64 {
        self.total_completed
    }

    /// 신뢰하지 않는 발신자로 버려진 레코드 수
    pub fn untrusted_dropped(&self) -> u64 {
        self.untrusted_dropped
    }

    /// 미완성 상태로 밀려난 레코드 수
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
