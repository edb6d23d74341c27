//! zeny-crawler CLI support: config resolution and output formatting.

pub mod config;
pub mod output;
