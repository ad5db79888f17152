//! # ChefCode Backend
//!
//! Restaurant-management backend: an inventory, recipe and production-task
//! snapshot shared by the web and mobile clients, a parser for Italian
//! inventory commands and a chat assistant that executes them.

pub mod assistant;
pub mod chat_client;
pub mod circuit_breaker;
pub mod command_parser;
pub mod command_patterns;
pub mod config;
pub mod consumption;
pub mod inventory;
pub mod localization;
pub mod recipes;
pub mod server;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod units;
