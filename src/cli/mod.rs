pub mod app;
pub mod commands;

pub use app::{App, TestKind, TestSelection};
pub use commands::Cli;
