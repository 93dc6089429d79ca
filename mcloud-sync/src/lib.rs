pub mod config;
pub mod digest;
pub mod engine;
pub mod transfer;
