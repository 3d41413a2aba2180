// Public API for integration tests and potential library usage

pub mod api;
pub mod cards;
pub mod config;
pub mod deck;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod queue;
pub mod room;
pub mod state;
pub mod store;
pub mod types;
pub mod view;
pub mod ws;

// Per-viewer broadcasting on AppState
pub mod broadcast;
