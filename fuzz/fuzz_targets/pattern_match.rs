#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use postwatch_tracker::PatternEngine;

fn engine() -> &'static PatternEngine {
    static ENGINE: OnceLock<PatternEngine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        PatternEngine::compile(&[
            r"(?P<id>\w{6}-\w{6}-\w{2}) => (?P<to>\S+) ",
            r"(?P<id>\w{6}-\w{6}-\w{2}) \*\* (?P<to>\S+) .*R=(?P<from>\S+) .*: (?P<status>\w+) (?P<reason>.+)$",
            r"(?P<id>\w{6}-\w{6}-\w{2}) Completed",
        ])
        .expect("fuzz patterns must compile")
    })
}

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    if let Some(captures) = engine().match_line(&line) {
        // 추출된 값은 항상 입력 라인의 일부
        for value in [&captures.id, &captures.to, &captures.from, &captures.status, &captures.reason]
            .into_iter()
            .flatten()
        {
            assert!(line.contains(value.as_str()));
        }
    }
});
