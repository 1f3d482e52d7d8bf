//! CLI subcommand implementations.

pub mod quote;
pub mod sign;
