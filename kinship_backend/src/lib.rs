pub mod api;
pub mod auth;
pub mod blog;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod contact;
pub mod database;
pub mod errors;
pub mod events;
pub mod family;
pub mod media;
pub mod node;
pub mod polls;
pub mod realtime;
pub mod telemetry;
pub mod utils;
pub mod voting;
