#![no_main]
use libfuzzer_sys::fuzz_target;

use stay_pricing::domain::dates::{format_date_key, parse_date_key};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(date) = parse_date_key(text)
    {
        let key = format_date_key(date);
        assert_eq!(parse_date_key(&key).ok(), Some(date));
    }
});
