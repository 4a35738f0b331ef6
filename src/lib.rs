//! noteql - parameterized SQL blocks for notebook-style hosts.
//!
//! The `nql` magic parses a directive line, renders the SQL template
//! against the host's variables, runs it on a session and binds the result
//! back into the host in whichever shapes were asked for.

pub mod cell;
pub mod config;
pub mod db;
pub mod directive;
pub mod error;
pub mod export;
pub mod frame;
pub mod logging;
pub mod magic;
pub mod namespace;
pub mod output;
pub mod session;
pub mod template;
