#![forbid(unsafe_code)]

pub mod cli;
pub mod client;
pub mod config;
pub mod doctor;
pub mod error;
pub mod palette;
pub mod pipeline;
pub mod substitute;
pub mod theme;
pub mod tools;
pub mod util;
pub mod web;
pub mod workspace;

pub use cli::run_from_env;
pub use error::{ForgeError, Result};
