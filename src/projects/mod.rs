// src/projects/mod.rs

pub mod store;
pub mod types;
