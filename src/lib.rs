// ABOUTME: Root library module for the multi-bot webhook host
// ABOUTME: Exposes the adapter, bots, registry, service wiring and configuration

pub mod adapter;
pub mod auth;
pub mod bots;
pub mod config;
pub mod connector;
pub mod registry;
pub mod service;

pub use teambots_core::{Activity, Bot, BotConfig, TurnContext};

pub use adapter::BotAdapter;
pub use registry::{BotEntry, BotOptions, BotRef, BotRegistry};
pub use service::BotService;
