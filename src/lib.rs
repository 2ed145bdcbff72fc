pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod runner;
