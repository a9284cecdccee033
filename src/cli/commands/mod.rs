pub mod config;
pub mod investigate;
pub mod status;
