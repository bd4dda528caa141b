//! 완료 이력 -- 최근 완료된 레코드의 고정 크기 링
//!
//! 키로 색인하지 않는 삽입 순서 링입니다. 같은 주소에 대한 여러 항목이 공존하며,
//! 각각은 연속된 전달 시도나 상태 변화를 나타냅니다.
//! 크기가 작게 유지되므로 조회는 선형 탐색으로 충분합니다.

use std::collections::VecDeque;

use crate::record::CompletedRecord;

/// 완료 레코드 링 (최신이 앞)
pub struct CompletionCache {
    entries: VecDeque<(String, CompletedRecord)>,
    capacity: usize,
}

impl CompletionCache {
    /// 최대 `capacity`개를 보관하는 링을 생성합니다. 0은 1로 취급합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// 레코드를 맨 앞에 추가하고, 용량을 넘으면 가장 오래된 항목을 버립니다.
    ///
    /// 키는 소문자로 정규화됩니다.
    pub fn push(&mut self, key: &str, record: CompletedRecord) {
        self.entries.push_front((key.to_lowercase(), record));
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// 키가 일치하는 레코드를 최신순으로 최대 `limit`개 반환합니다.
    ///
    /// 키는 대소문자를 무시하고 비교합니다. 링은 변경하지 않습니다.
    pub fn query(&self, key: &str, limit: usize) -> Vec<&CompletedRecord> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, record)| record)
            .take(limit)
            .collect()
    }

    /// 현재 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 최신순으로 모든 레코드를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &CompletedRecord> {
        self.entries.iter().map(|(_, record)| record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use proptest::prelude::*;

    fn record(to: &str, status: &str) -> CompletedRecord {
        CompletedRecord {
            id: format!("{to}-{status}"),
            to: to.to_owned(),
            from: "mta1".to_owned(),
            status: status.to_owned(),
            reason: "reason".to_owned(),
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn query_returns_newest_first() {
        let mut cache = CompletionCache::new(10);
        cache.push("a@x.com", record("a@x.com", "deferred"));
        cache.push("b@x.com", record("b@x.com", "sent"));
        cache.push("a@x.com", record("a@x.com", "bounced"));

        let found = cache.query("a@x.com", 10);
        let statuses: Vec<_> = found.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["bounced", "deferred"]);
    }

    #[test]
    fn query_is_case_insensitive() {
        let mut cache = CompletionCache::new(10);
        cache.push("A@Example.com", record("A@Example.com", "sent"));
        assert_eq!(cache.query("a@example.COM", 3).len(), 1);
    }

    #[test]
    fn query_respects_limit() {
        let mut cache = CompletionCache::new(10);
        for status in ["one", "two", "three", "four"] {
            cache.push("a@x.com", record("a@x.com", status));
        }
        let found = cache.query("a@x.com", 3);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].status, "four");
    }

    #[test]
    fn query_missing_key_is_empty() {
        let mut cache = CompletionCache::new(10);
        cache.push("a@x.com", record("a@x.com", "sent"));
        assert!(cache.query("nobody@x.com", 3).is_empty());
    }

    #[test]
    fn evicts_oldest_inserted() {
        let mut cache = CompletionCache::new(2);
        cache.push("a@x.com", record("a@x.com", "first"));
        cache.push("b@x.com", record("b@x.com", "second"));
        cache.push("c@x.com", record("c@x.com", "third"));

        assert_eq!(cache.len(), 2);
        assert!(cache.query("a@x.com", 3).is_empty());
        let order: Vec<_> = cache.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(order, vec!["third", "second"]);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity_and_keeps_reverse_insertion_order(
            cap in 1usize..20,
            count in 0usize..100,
        ) {
            let mut cache = CompletionCache::new(cap);
            for i in 0..count {
                cache.push("same@x.com", record("same@x.com", &i.to_string()));
                prop_assert!(cache.len() <= cap);
            }
            let got: Vec<usize> = cache
                .query("same@x.com", usize::MAX)
                .iter()
                .map(|r| r.status.parse().unwrap())
                .collect();
            let expected: Vec<usize> = (0..count).rev().take(cap).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
