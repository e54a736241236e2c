pub mod blob;
pub mod cda;
pub mod cli;
pub mod clob;
pub mod load_config;
pub mod logging;

pub use cli::{run, Cli, Commands};
