//! Subcommand implementations.

pub mod completions;
pub mod hash;
pub mod info;
pub mod install;
pub mod list;
pub mod verify;
