//! Infrastructure layer module
//!
//! This module contains the infrastructure adapters:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - HTTP appearance capabilities (reqwest)
//! - In-memory inventory, asset and avatar adapters
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod http;
pub mod logging;
pub mod memory;
