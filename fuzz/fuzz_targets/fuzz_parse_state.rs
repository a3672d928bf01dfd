#![no_main]
use goe_surplus::mode::ChargePriority;
use goe_surplus::telemetry::{Reading, ReadingKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(state) = std::str::from_utf8(data) else {
        return;
    };

    // Entity states arrive as arbitrary strings
    for kind in [ReadingKind::Float, ReadingKind::Text] {
        if let Some(Reading::Float(v)) = Reading::parse(state, kind) {
            assert!(v.is_finite());
        }
    }
    if let Some(p) = ChargePriority::parse(state) {
        assert_eq!(ChargePriority::from_code(p.code()), Some(p));
    }
});
