#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Used by main.rs only
use dotenvy as _;

// Used by integration tests
#[cfg(test)]
use hound as _;
#[cfg(test)]
use parking_lot as _;

pub mod commands;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod parser;
pub mod script;

pub use commands::Commands;
pub use parser::Cli;
pub use script::ScriptLine;
