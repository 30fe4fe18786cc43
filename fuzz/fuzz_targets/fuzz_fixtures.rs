#![no_main]
use libfuzzer_sys::fuzz_target;

use stay_pricing::adapters::memory_store::{Fixtures, InMemoryStore};

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data)
        && let Ok(fixtures) = serde_yml::from_str::<Fixtures>(yaml)
    {
        let _ = InMemoryStore::from_fixtures(fixtures);
    }
});
