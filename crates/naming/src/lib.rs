//! Service registration records for gateway instances.
//!
//! A [`ServiceRegistration`] describes how to reach one gateway (id, address,
//! protocol, tags, metadata). The gateway runtime only reads it to label its
//! server; a [`Naming`] registry stores and looks registrations up.

mod memory;
mod service;

pub use memory::MemoryNaming;
pub use service::{DefaultService, ServiceRegistration};

/// Errors for naming operations.
#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("invalid registration: {0}")]
    Invalid(String),
}

/// A registry of gateway services.
pub trait Naming: Send + Sync {
    /// Returns every registration published under `service_name`.
    fn find(&self, service_name: &str) -> Result<Vec<DefaultService>, NamingError>;

    /// Removes one instance of `service_name`.
    fn remove(&self, service_name: &str, service_id: &str) -> Result<(), NamingError>;

    /// Publishes (or replaces) a registration.
    fn register(&self, service: DefaultService) -> Result<(), NamingError>;

    /// Removes a registration by id, whatever its service name.
    fn deregister(&self, service_id: &str) -> Result<(), NamingError>;
}
