#![no_main]

use interpose::config::InstrumentationConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and validation must reject bad input without panicking
        if let Ok(config) = InstrumentationConfig::from_toml_str(input) {
            let _ = config.validate();
            let _ = config.slow_call_threshold_us();
        }
    }
});
