#![no_main]
use diffcov::parsers::Parser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // LCOV parser must not panic on any input.
    let _ = diffcov::parsers::lcov::LcovParser.parse(data);
});
