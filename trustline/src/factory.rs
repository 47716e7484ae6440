//! Channel factories

use std::{fmt, marker::PhantomData, sync::Arc};

use arc_swap::ArcSwap;
use trustline_tokens::SecurityToken;
use url::Url;

use crate::{
    binding::Binding,
    channel::{Channel, ChannelRequest, Contract, Transport},
    config::ClientEndpoint,
    credentials::ClientCredentials,
    error::Error,
};

/// A reusable factory for channels to one contract's endpoint
///
/// Factories are expensive to construct and cheap to use. Channels may be
/// created concurrently from a shared factory.
pub struct ChannelFactory<C> {
    endpoint: ClientEndpoint,
    pub(crate) credentials: ArcSwap<ClientCredentials>,
    transport: Arc<dyn Transport>,
    contract: PhantomData<fn() -> C>,
}

impl<C: Contract> ChannelFactory<C> {
    /// Constructs a factory for `endpoint` with default credentials
    pub fn new(endpoint: ClientEndpoint, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint,
            credentials: ArcSwap::from_pointee(ClientCredentials::default()),
            transport,
            contract: PhantomData,
        }
    }

    /// Creates a client over a new channel
    pub fn create_channel(&self) -> Result<C::Client, Error> {
        self.open(None)
    }

    /// Creates a client over a new channel presenting an issued token
    pub fn create_channel_with_issued_token(
        &self,
        token: Arc<SecurityToken>,
    ) -> Result<C::Client, Error> {
        self.open(Some(token))
    }

    fn open(&self, issued_token: Option<Arc<SecurityToken>>) -> Result<C::Client, Error> {
        let credentials = self.credentials();
        let link = self
            .transport
            .open(ChannelRequest {
                endpoint: &self.endpoint,
                credentials: &credentials,
                issued_token: issued_token.as_deref(),
            })
            .map_err(Error::transport)?;

        let channel = Channel::new(
            C::NAME,
            self.endpoint.address.clone(),
            credentials,
            issued_token,
            link,
        );

        Ok(C::client(channel))
    }
}

impl<C> ChannelFactory<C> {
    /// The endpoint channels are created for
    pub fn endpoint(&self) -> &ClientEndpoint {
        &self.endpoint
    }

    /// The endpoint's binding
    pub fn binding(&self) -> &Binding {
        &self.endpoint.binding
    }

    /// The endpoint's address
    pub fn address(&self) -> &Url {
        &self.endpoint.address
    }

    /// The credentials currently attached to the factory
    pub fn credentials(&self) -> Arc<ClientCredentials> {
        self.credentials.load_full()
    }
}

impl<C> fmt::Debug for ChannelFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChannelFactory")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials.load_full())
            .field("transport", &self.transport)
            .finish()
    }
}
