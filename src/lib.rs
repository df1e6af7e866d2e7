pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod model;
pub mod server;
pub mod time;
pub mod views;

#[cfg(test)]
mod fixtures;
