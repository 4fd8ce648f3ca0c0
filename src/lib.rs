pub mod config;
pub mod error;
pub mod exec;
pub mod gate;
pub mod notify;
pub mod platform;
pub mod summary;
pub mod workflow;
