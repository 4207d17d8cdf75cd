#![no_main]
use libfuzzer_sys::fuzz_target;

use respgate_core::request::{DecisionRequest, GateContext};

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = serde_json::from_slice::<DecisionRequest>(data) {
        if req.validate().is_ok() {
            let ctx = GateContext::new("fuzz", req);
            let _ = ctx.action_type();
            let _ = ctx.loop_state();
            let _ = ctx.number_field("amount");
        }
    }
});
