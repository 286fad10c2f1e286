//! Command implementations behind the `buybye` binary.

pub mod cmd;
pub mod config;
pub mod output;
