#![forbid(unsafe_code)]

pub mod breaker;
pub mod classifier;
pub mod evidence;
pub mod gate;
pub mod matrix;
pub mod trace;

pub use gate::{Gate, GateBuilder};
