//! Command line front end for the cutout pipeline
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod workspace;

pub use main_impl::{main, Cli, CliOperation};
