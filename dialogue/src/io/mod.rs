//! I/O seams: persistence, memory, configuration and model backends.

pub mod config;
pub mod memory;
pub mod model;
pub mod store;
