//! Common errors

use std::error::Error as StdError;

use thiserror::Error;

/// A boxed error raised by a transport or token service
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The client configuration cannot satisfy the request
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No configured endpoint matches the contract
    #[error("Unable to get client endpoint: no endpoint configured for contract '{contract}'")]
    NoEndpoint {
        /// The contract being resolved
        contract: &'static str,
    },
    /// More than one configured endpoint matches the contract
    #[error(
        "Unable to get client endpoint: {count} endpoints configured for contract '{contract}'"
    )]
    AmbiguousEndpoint {
        /// The contract being resolved
        contract: &'static str,
        /// The number of matching endpoints
        count: usize,
    },
    /// The federation binding's issuer binding is absent or of the wrong type
    #[error("Unable to get WS2007HttpBinding")]
    MissingIssuerBinding,
    /// The federation binding has no issuer address
    #[error("federation binding has no issuer address")]
    MissingIssuerAddress,
    /// No token service transport is available to issue tokens
    #[error("no token service configured for federated endpoints")]
    NoTokenService,
    /// The client section document could not be parsed
    #[error("malformed client section")]
    Parse(#[from] serde_json::Error),
}

/// The caller is not permitted to make the request
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SecurityError {
    message: &'static str,
}

impl SecurityError {
    /// The message describing the failure
    pub fn message(&self) -> &'static str {
        self.message
    }
}

pub(crate) const fn identity_not_set() -> SecurityError {
    SecurityError {
        message: "Identity must be set",
    }
}

/// An error raised while creating a client
#[derive(Debug, Error)]
pub enum Error {
    /// The client configuration cannot satisfy the request
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The caller is not permitted to make the request
    #[error(transparent)]
    Security(#[from] SecurityError),
    /// The transport or token service failed
    #[error(transparent)]
    Transport(BoxError),
}

impl Error {
    pub(crate) fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport(source.into())
    }
}
