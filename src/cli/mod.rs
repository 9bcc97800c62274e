//! Command-line interface module.

mod args;
pub mod build;
pub mod init;
pub mod pack;
pub mod watch;

pub use args::{Cli, Commands};
