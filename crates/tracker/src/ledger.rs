//! 중복 알림 억제 원장
//!
//! 상관 ID별로 마지막으로 알린 상태를 기억합니다. 같은 ID가 같은 상태로 다시
//! 완성되면 알림을 억제하고, 상태가 바뀌면 항상 새로 알립니다.
//! 프로세스 전역 싱글턴이 아니라 [`Accumulator`](crate::accumulator::Accumulator)에
//! 주입되는 객체이며, 미완성 테이블과 같은 LRU 정책으로 크기가 제한됩니다.

use crate::bounded::BoundedLru;

/// 상관 ID -> 마지막 알림 상태
pub struct DedupLedger {
    statuses: BoundedLru<String, String>,
}

impl DedupLedger {
    /// 최대 `capacity`개의 ID를 기억하는 원장을 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            statuses: BoundedLru::new(capacity),
        }
    }

    /// 이번 완성을 알려야 하는지 결정하고 원장을 갱신합니다.
    ///
    /// 원장에 같은 상태가 이미 있으면 `false`를 반환합니다 (항목은 터치됨).
    pub fn should_notify(&mut self, id: &str, status: &str) -> bool {
        if self.statuses.get(id).is_some_and(|last| last == status) {
            return false;
        }
        if let Some((forgotten, _)) = self.statuses.insert(id.to_owned(), status.to_owned()) {
            tracing::trace!(id = %forgotten, "dedup ledger forgot oldest id");
        }
        true
    }

    /// 마지막으로 알린 상태를 조회합니다.
    pub fn last_status(&self, id: &str) -> Option<&str> {
        self.statuses.peek(id).map(String::as_str)
    }

    /// 기억 중인 ID 수
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.statuses.capacity()
    }
}
