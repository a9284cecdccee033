//! Command-line interface.

pub mod commands;
