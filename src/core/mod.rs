// logsieve - core/mod.rs
//
// Core business logic layer: data model, record tree, filter model, parsing.
// Must NOT depend on: app or platform. No dispatcher, no thread pool.

pub mod discovery;
pub mod export;
pub mod filter;
pub mod model;
pub mod observable;
pub mod parser;
pub mod tree;
