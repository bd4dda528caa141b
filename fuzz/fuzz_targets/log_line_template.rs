#![no_main]

use libfuzzer_sys::fuzz_target;
use postwatch_tracker::LogLineTemplate;

// 템플릿 파싱은 어떤 입력에도 패닉하지 않아야 함
fuzz_target!(|data: &[u8]| {
    if let Ok(template) = std::str::from_utf8(data) {
        let _ = LogLineTemplate::parse(template);
    }
});
