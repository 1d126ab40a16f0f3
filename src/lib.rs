// Library entry so integration tests can drive the controller without a gateway.
pub mod bot;
pub mod commands;
pub mod components;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod registry;
pub mod storage;

pub use bot::CryptoBot;
pub use error::{BotError, Result};
