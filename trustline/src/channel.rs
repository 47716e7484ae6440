//! Contracts, channels, and the transport that connects them

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use trustline_tokens::SecurityToken;
use url::Url;

use crate::{config::ClientEndpoint, credentials::ClientCredentials, error::BoxError};

/// A service contract
///
/// The contract's name is matched against the `contract` of configured
/// endpoints. Implementors wrap a [`Channel`] in a client exposing the
/// contract's operations.
pub trait Contract: 'static {
    /// The fully qualified contract name
    const NAME: &'static str;

    /// The client type exposing the contract's operations
    type Client;

    /// Wraps an open channel in a client
    fn client(channel: Channel) -> Self::Client;
}

/// A transport-level connection underlying a channel
#[async_trait]
pub trait ChannelLink: Send + Sync + fmt::Debug {
    /// Invokes the operation identified by `action` with an encoded body
    async fn invoke(&self, action: &str, body: Vec<u8>) -> Result<Vec<u8>, BoxError>;
}

/// The parameters for opening a channel
#[derive(Clone, Copy, Debug)]
pub struct ChannelRequest<'a> {
    /// The endpoint to connect to
    pub endpoint: &'a ClientEndpoint,
    /// The credentials to present
    pub credentials: &'a ClientCredentials,
    /// The issued token to present, for federated endpoints
    pub issued_token: Option<&'a SecurityToken>,
}

/// The RPC framework that establishes connections to endpoints
pub trait Transport: Send + Sync + fmt::Debug {
    /// Opens a connection for a channel
    fn open(&self, request: ChannelRequest<'_>) -> Result<Box<dyn ChannelLink>, BoxError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn open(&self, request: ChannelRequest<'_>) -> Result<Box<dyn ChannelLink>, BoxError> {
        (**self).open(request)
    }
}

/// An open channel to a service endpoint
#[derive(Debug)]
pub struct Channel {
    contract: &'static str,
    address: Url,
    credentials: Arc<ClientCredentials>,
    issued_token: Option<Arc<SecurityToken>>,
    link: Box<dyn ChannelLink>,
}

impl Channel {
    pub(crate) fn new(
        contract: &'static str,
        address: Url,
        credentials: Arc<ClientCredentials>,
        issued_token: Option<Arc<SecurityToken>>,
        link: Box<dyn ChannelLink>,
    ) -> Self {
        Self {
            contract,
            address,
            credentials,
            issued_token,
            link,
        }
    }

    /// The contract served over this channel
    pub fn contract(&self) -> &'static str {
        self.contract
    }

    /// The address of the service
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// The credentials presented by this channel
    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    /// The issued token presented by this channel, if federated
    pub fn issued_token(&self) -> Option<&Arc<SecurityToken>> {
        self.issued_token.as_ref()
    }

    /// Invokes the operation identified by `action`
    pub async fn invoke(&self, action: &str, body: Vec<u8>) -> Result<Vec<u8>, BoxError> {
        self.link.invoke(action, body).await
    }
}
