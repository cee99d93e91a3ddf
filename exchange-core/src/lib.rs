//! Exchange adapters, constraint loading and the exchange manager.

pub mod config;
pub mod exchange;
pub mod service;
