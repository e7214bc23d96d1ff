#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Patch parsing must fail cleanly, never panic, and every added line
    // it reports must be a real 1-based target line.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(index) = diffcov::diff::parse_diff(s) {
            for lines in index.values() {
                assert!(!lines.is_empty());
                assert!(lines.iter().all(|&l| l >= 1));
            }
        }
    }
});
