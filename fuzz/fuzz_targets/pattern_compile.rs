#![no_main]

use libfuzzer_sys::fuzz_target;
use postwatch_tracker::PatternEngine;

// 임의의 패턴 문자열은 Ok 또는 Err이어야 하며 패닉하면 안 됨
fuzz_target!(|data: &[u8]| {
    if let Ok(pattern) = std::str::from_utf8(data) {
        let _ = PatternEngine::compile(&[pattern]);
    }
});
