#![no_main]
use libfuzzer_sys::fuzz_target;
use arenaxml::parser::{parse_str_with_options, ParseOptions};
use arenaxml::serial::serialize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Anything that parses must serialize to something that parses again
        // and serializes identically.
        if let Ok(arena) = parse_str_with_options(s, &ParseOptions::default()) {
            let output = serialize(&arena);
            let reparsed = parse_str_with_options(&output, &ParseOptions::default())
                .unwrap_or_else(|e| panic!("reparse failed: {e}\n{output}"));
            assert_eq!(serialize(&reparsed), output);
        }
    }
});
