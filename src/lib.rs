pub mod ai;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod state;
pub mod utils;

pub use crate::config::Config;
pub use crate::error::{AppError, Result};
pub use crate::state::AppState;
