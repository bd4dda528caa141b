//! 크기가 제한된 LRU 테이블
//!
//! 미완성 레코드 테이블과 중복 제거 원장이 같은 정책을 공유합니다.
//! 삽입과 갱신은 모두 "터치"로 취급되어 항목을 가장 최근 사용으로 옮기고,
//! 새 키 삽입이 용량을 넘기면 가장 오래 터치되지 않은 항목을 밀어냅니다.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// LRU 정책을 가지는 고정 용량 테이블
pub struct BoundedLru<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
}

impl<K: Hash + Eq, V> BoundedLru<K, V> {
    /// 용량이 `capacity`인 테이블을 생성합니다. 0은 1로 취급합니다.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    /// 새 키를 넣기 전에 자리가 없으면 가장 오래 터치되지 않은 항목을 꺼냅니다.
    fn make_room_for(&mut self, key: &K) -> Option<(K, V)> {
        if !self.inner.contains(key) && self.inner.len() >= self.inner.cap().get() {
            self.inner.pop_lru()
        } else {
            None
        }
    }

    /// 키를 터치하고 값에 대한 가변 참조를 반환합니다.
    ///
    /// 키가 없으면 `make`로 생성해 삽입하며, 이때 용량 초과로 밀려난 항목을 함께 반환합니다.
    pub fn touch_or_insert_with(
        &mut self,
        key: K,
        make: impl FnOnce() -> V,
    ) -> (&mut V, Option<(K, V)>) {
        let evicted = self.make_room_for(&key);
        (self.inner.get_or_insert_mut(key, make), evicted)
    }

    /// 값을 삽입하거나 덮어쓰고 키를 터치합니다.
    ///
    /// 용량 초과로 밀려난 항목이 있으면 반환합니다.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let evicted = self.make_room_for(&key);
        self.inner.put(key, value);
        evicted
    }

    /// 값을 조회하고 키를 터치합니다.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    /// 터치하지 않고 값을 조회합니다.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek(key)
    }

    /// 키가 있는지 확인합니다 (터치하지 않음).
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    /// 항목을 제거하고 값을 반환합니다.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.pop(key)
    }

    /// 현재 항목 수
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// 가장 최근에 터치된 것부터 키를 순회합니다.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().map(|(k, _)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_capacity_is_treated_as_one() {
        let table: BoundedLru<u32, u32> = BoundedLru::new(0);
        assert_eq!(table.capacity(), 1);
    }

    #[test]
    fn evicts_least_recently_touched_not_oldest_created() {
        let mut table = BoundedLru::new(2);
        assert!(table.insert("a", 1).is_none());
        assert!(table.insert("b", 2).is_none());

        // "a"를 터치하면 "b"가 가장 오래된 항목이 됨
        let (value, evicted) = table.touch_or_insert_with("a", || 0);
        *value += 10;
        assert!(evicted.is_none());

        let evicted = table.insert("c", 3);
        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(table.peek("a"), Some(&11));
        assert!(table.contains("c"));
    }

    #[test]
    fn updating_existing_key_never_evicts() {
        let mut table = BoundedLru::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert!(table.insert("a", 5).is_none());
        assert_eq!(table.len(), 2);
        assert_eq!(table.peek("a"), Some(&5));
    }

    #[test]
    fn touch_or_insert_reports_eviction() {
        let mut table = BoundedLru::new(1);
        table.insert("a", 1);
        let (value, evicted) = table.touch_or_insert_with("b", || 2);
        assert_eq!(*value, 2);
        assert_eq!(evicted, Some(("a", 1)));
    }

    #[test]
    fn peek_does_not_touch() {
        let mut table = BoundedLru::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.peek("a"), Some(&1));
        // peek은 순서를 바꾸지 않으므로 "a"가 밀려남
        assert_eq!(table.insert("c", 3), Some(("a", 1)));
    }

    #[test]
    fn get_touches() {
        let mut table = BoundedLru::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.get("a"), Some(&1));
        assert_eq!(table.insert("c", 3), Some(("b", 2)));
    }

    #[test]
    fn remove_frees_slot() {
        let mut table = BoundedLru::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.remove("a"), Some(1));
        assert!(table.insert("c", 3).is_none());
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec!["c", "b"]);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(cap in 1usize..16, keys in proptest::collection::vec(0u8..32, 0..200)) {
            let mut table = BoundedLru::new(cap);
            for key in keys {
                let had_room = table.len() < cap || table.contains(&key);
                let (_, evicted) = table.touch_or_insert_with(key, || ());
                prop_assert!(table.len() <= cap);
                prop_assert_eq!(evicted.is_none(), had_room);
            }
        }

        #[test]
        fn evicted_key_is_the_least_recently_touched(cap in 1usize..8, keys in proptest::collection::vec(0u8..16, 1..100)) {
            let mut table = BoundedLru::new(cap);
            // 기대 순서: 앞쪽이 가장 최근
            let mut order: Vec<u8> = Vec::new();
            for key in keys {
                let expected = if !order.contains(&key) && order.len() == cap {
                    order.pop()
                } else {
                    None
                };
                order.retain(|k| *k != key);
                order.insert(0, key);

                let (_, evicted) = table.touch_or_insert_with(key, || ());
                prop_assert_eq!(evicted.map(|(k, _)| k), expected);
            }
            prop_assert_eq!(table.keys().copied().collect::<Vec<_>>(), order);
        }
    }
}
