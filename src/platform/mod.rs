// logsieve - platform/mod.rs
//
// Platform abstraction layer: directories, config.toml, file reading.
// Must NOT depend on: core or app.

pub mod config;
pub mod fs;
