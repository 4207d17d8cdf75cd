#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = respgate_engine::matrix::Matrix::from_slice(data, "fuzz.json");
});
