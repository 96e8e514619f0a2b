//! Command implementations

pub mod config;
pub mod scan;
pub mod version;
