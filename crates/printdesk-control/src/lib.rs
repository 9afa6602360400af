pub mod config;
pub mod health;
pub mod state;
pub mod ticker;
