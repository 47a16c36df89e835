// logsieve - app/mod.rs
//
// Application layer: services that load, index and filter log files on top
// of the core model, plus the state they publish to a presentation layer.

pub mod dispatcher;
pub mod filter_service;
pub mod index;
pub mod loader;
pub mod reader;
pub mod state;
pub mod workspace;
