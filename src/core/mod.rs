pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod progress;
pub mod session;
pub mod store;
pub mod targets;
