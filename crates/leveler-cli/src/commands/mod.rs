//! CLI command implementations.

pub mod ask;
pub mod common;
pub mod config;
pub mod devices;
pub mod record;
pub mod render;
pub mod run;
