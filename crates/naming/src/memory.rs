//! In-process naming registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::{DefaultService, Naming, NamingError};

/// Naming registry backed by a map keyed on service id.
#[derive(Debug, Default)]
pub struct MemoryNaming {
    services: RwLock<HashMap<String, DefaultService>>,
}

impl MemoryNaming {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Naming for MemoryNaming {
    fn find(&self, service_name: &str) -> Result<Vec<DefaultService>, NamingError> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<DefaultService> = services
            .values()
            .filter(|s| s.name == service_name)
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(NamingError::NotFound(service_name.to_string()));
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn remove(&self, service_name: &str, service_id: &str) -> Result<(), NamingError> {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        match services.get(service_id) {
            Some(s) if s.name == service_name => {
                services.remove(service_id);
                Ok(())
            }
            _ => Err(NamingError::NotFound(format!("{service_name}/{service_id}"))),
        }
    }

    fn register(&self, service: DefaultService) -> Result<(), NamingError> {
        if service.id.is_empty() {
            return Err(NamingError::Invalid("service id is empty".into()));
        }
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service.id.clone(), service);
        Ok(())
    }

    fn deregister(&self, service_id: &str) -> Result<(), NamingError> {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(service_id)
            .map(|_| ())
            .ok_or_else(|| NamingError::NotFound(service_id.to_string()))
    }
}
