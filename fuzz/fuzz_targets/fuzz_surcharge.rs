//! Fuzz target for surcharge extraction.
//!
//! Any JSON document yields either no table or a non-empty table of
//! positive amounts.

#![no_main]

use checkout_fields::surcharge::extract_network_surcharges;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Some(table) = extract_network_surcharges(&value) {
        assert!(!table.is_empty());
        assert!(table.values().all(|&amount| amount > 0));
    }
});
