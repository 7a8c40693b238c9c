//! Subcommand handlers.
//!
//! Each handler loads its config, builds the library objects and owns them
//! until Ctrl-C or until its work is done. Blocking library calls never run
//! on the async runtime's worker threads.

pub mod serve;
pub mod speak;
