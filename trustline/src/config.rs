//! Client endpoint configuration

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{binding::Binding, error::ConfigurationError};

/// A configured client endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEndpoint {
    /// The name of the endpoint
    pub name: String,
    /// The fully qualified name of the contract served at the endpoint
    pub contract: String,
    /// The address of the service
    pub address: Url,
    /// The binding used to reach the service
    pub binding: Binding,
}

/// A source of client endpoint configuration
pub trait ConfigResolver: Send + Sync + fmt::Debug {
    /// All configured endpoints for the named contract
    fn client_endpoints(&self, contract: &str) -> Vec<&ClientEndpoint>;
}

/// A static set of client endpoints
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    /// The configured endpoints
    #[serde(default)]
    pub endpoints: Vec<ClientEndpoint>,
}

impl ClientSection {
    /// Parses a client section from a JSON document
    ///
    /// ```
    /// use trustline::config::{ClientSection, ConfigResolver};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let section = ClientSection::from_json(r#"{
    ///     "endpoints": [{
    ///         "name": "orders",
    ///         "contract": "shop.OrderService",
    ///         "address": "https://shop.example.com/orders",
    ///         "binding": { "type": "basicHttpBinding" }
    ///     }]
    /// }"#)?;
    ///
    /// assert_eq!(section.client_endpoints("shop.OrderService").len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds an endpoint to the section
    pub fn with_endpoint(mut self, endpoint: ClientEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }
}

impl ConfigResolver for ClientSection {
    fn client_endpoints(&self, contract: &str) -> Vec<&ClientEndpoint> {
        self.endpoints
            .iter()
            .filter(|e| e.contract == contract)
            .collect()
    }
}

/// Resolves the single endpoint configured for `contract`
///
/// When `binding` is provided, only endpoints whose binding name matches it
/// (ignoring case) are considered.
pub fn resolve_endpoint(
    resolver: &dyn ConfigResolver,
    contract: &'static str,
    binding: Option<&str>,
) -> Result<ClientEndpoint, ConfigurationError> {
    let mut endpoints = resolver.client_endpoints(contract);
    if let Some(binding) = binding {
        endpoints.retain(|e| e.binding.matches_name(binding));
    }

    match endpoints.as_slice() {
        [endpoint] => Ok((*endpoint).clone()),
        [] => Err(ConfigurationError::NoEndpoint { contract }),
        _ => Err(ConfigurationError::AmbiguousEndpoint {
            contract,
            count: endpoints.len(),
        }),
    }
}
