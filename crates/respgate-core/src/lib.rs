#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod evidence;
pub mod loop_state;
pub mod reasons;
pub mod reference;
pub mod request;
pub mod response;
pub mod schema;
pub mod traits;
pub mod types;
