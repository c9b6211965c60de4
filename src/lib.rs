pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod services;
pub mod types;
pub mod webform;
