//! Gateway registration records.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Read-only view of a registered gateway instance.
pub trait ServiceRegistration: fmt::Display + Send + Sync {
    fn service_id(&self) -> &str;
    fn service_name(&self) -> &str;
    fn public_address(&self) -> &str;
    fn public_port(&self) -> u16;
    /// Address a client dials to reach this instance.
    fn dial_url(&self) -> String;
    fn protocol(&self) -> &str;
    fn namespace(&self) -> &str;
    fn tags(&self) -> &[String];
    fn meta(&self) -> &HashMap<String, String>;
}

/// Plain registration record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultService {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl DefaultService {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        protocol: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port,
            protocol: protocol.into(),
            ..Self::default()
        }
    }
}

impl ServiceRegistration for DefaultService {
    fn service_id(&self) -> &str {
        &self.id
    }

    fn service_name(&self) -> &str {
        &self.name
    }

    fn public_address(&self) -> &str {
        &self.address
    }

    fn public_port(&self) -> u16 {
        self.port
    }

    fn dial_url(&self) -> String {
        if self.protocol == "tcp" {
            format!("{}:{}", self.address, self.port)
        } else {
            format!("{}://{}:{}", self.protocol, self.address, self.port)
        }
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }
}

impl fmt::Display for DefaultService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id:{}, name:{}, address:{}, port:{}, ns:{}, tags:{:?}, meta:{:?}",
            self.id, self.name, self.address, self.port, self.namespace, self.tags, self.meta
        )
    }
}
