//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust, implementing the
//! Terraform Plugin Protocol v6.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod request;

// Helper modules
pub mod defaults;
pub mod plan_modifier;

// Framework implementation modules
pub mod grpc;
pub mod proto;
pub mod server;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use provider::{DataSource, Provider, Resource};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use server::{serve, ServerConfig};
pub use types::{Config, Diagnostic, Diagnostics, Dynamic, State};
