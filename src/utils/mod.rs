pub mod config;
pub mod log;
pub mod terminal;
pub mod theme;
