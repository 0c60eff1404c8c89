// src/lib.rs

pub mod api;
pub mod config;
pub mod db;
pub mod projects;
pub mod server;
pub mod state;
pub mod tasks;
