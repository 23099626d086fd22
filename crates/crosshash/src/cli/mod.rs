//! CLI command modules.

pub mod config;
pub mod eval;
pub mod train;
