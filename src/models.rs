pub mod menu;
pub mod types;
pub mod user;
