#![no_main]

use benchkeeper::measurement::MeasurementSet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Recognition must never panic, and whatever it keeps must be recognized again
    if let Some(set) = MeasurementSet::from_runner_output(data) {
        assert!(set.is_well_formed());
        let again = MeasurementSet::from_runner_output(set.as_bytes());
        assert_eq!(again.map(|s| s.to_text()), Some(set.to_text()));
    }
});
