//! API Module
//!
//! - commands.rs: JSON command surface (one command per line)

pub mod commands;

pub use commands::{dispatch, handle_line, Command, Reply};
