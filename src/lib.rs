// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod profiles;
pub mod protocol;
pub mod rating;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
