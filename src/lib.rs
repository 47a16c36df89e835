// logsieve - lib.rs
//
// Library entry point, exposing the filter and search engine for the
// command-line front end, integration tests and embedding applications.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
