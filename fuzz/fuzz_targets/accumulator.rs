#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use postwatch_tracker::{Accumulator, Captures, CompletionCache, DedupLedger};

const INCOMPLETE_CAPACITY: usize = 4;
const HISTORY: usize = 8;

/// 퍼저용 구조적 입력: 캡처 시퀀스
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    events: Vec<FuzzCaptures>,
}

/// 작은 값 공간으로 제한해 같은 ID/상태가 자주 겹치도록 함
#[derive(Arbitrary, Debug)]
struct FuzzCaptures {
    id: Option<u8>,
    to: Option<u8>,
    from: Option<bool>,
    status: Option<u8>,
    reason: Option<u8>,
}

impl FuzzCaptures {
    fn into_captures(self) -> Captures {
        Captures {
            id: self.id.map(|v| format!("id{}", v % 8)),
            to: self.to.map(|v| format!("user{}@example.com", v % 4)),
            from: self
                .from
                .map(|trusted| if trusted { "mta1" } else { "relay" }.to_owned()),
            status: self.status.map(|v| format!("status{}", v % 3)),
            reason: self.reason.map(|v| format!("reason {v}")),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let mut accumulator = Accumulator::new(
        ["mta1"],
        INCOMPLETE_CAPACITY,
        DedupLedger::new(16),
        CompletionCache::new(HISTORY),
    );

    for event in input.events.into_iter().take(256) {
        if let Some(completion) = accumulator.ingest(event.into_captures()) {
            assert_eq!(completion.record.from, "mta1");
        }
        assert!(accumulator.incomplete_len() <= INCOMPLETE_CAPACITY);
        assert!(accumulator.history().len() <= HISTORY);
    }
});
