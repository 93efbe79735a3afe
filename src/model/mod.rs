pub mod availability;
pub mod command;
pub mod patterns;
pub mod state;
pub mod zone;
