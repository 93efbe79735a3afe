pub mod config;
pub mod zone;
