pub mod access;
pub mod banner;
pub mod config;
pub mod db;
pub mod error;
pub mod input;
pub mod menu;
pub mod models;
pub mod modules;
pub mod net;
pub mod prompts;
pub mod render;
pub mod services;
pub mod state;

// Convenient re-exports (so call sites can do `termgate::MenuEngine`, etc.)
pub use menu::MenuEngine;
pub use services::Services;
pub use state::{
    registry::SessionRegistry,
    session::{SessionHandle, SessionState},
    transport::{SessionTransport, Transport},
};
