// src/tasks/mod.rs
// The task hierarchy and scheduling-consistency engine.

pub mod assign;
pub mod baseline;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod outline;
pub mod policy;
pub mod service;
pub mod store;
pub mod tree;
pub mod types;
