//! The entry point for obtaining clients

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use trustline_tokens::{InMemoryTokenStore, SecurityToken, TokenStore};
use url::Url;

use crate::{
    binding::{BindingType, WsFederationHttpBinding},
    channel::{Contract, Transport},
    config::ConfigResolver,
    credentials::ClientCredentials,
    error::{ConfigurationError, Error},
    issuer::{SecurityTokenProvider, TokenIssuer, TrustChannelFactory},
    provider::ChannelFactoryManager,
    session::{CallContext, SessionManager},
};

type Sessions =
    SessionManager<Arc<ChannelFactoryManager>, Arc<dyn SecurityTokenProvider>, Arc<dyn TokenStore>>;

/// Creates ready-to-use clients for contracts
///
/// Constructed once at startup and shared by every call. Clones share the
/// same factory registry and token cache.
///
/// ```no_run
/// use std::sync::Arc;
/// # use trustline::channel::{Channel, ChannelLink, ChannelRequest, Contract, Transport};
/// # use trustline::error::BoxError;
/// use trustline::{config::ClientSection, CallContext, Clients, Identity};
///
/// # #[derive(Debug)]
/// # struct MyTransport;
/// # impl Transport for MyTransport {
/// #     fn open(&self, _: ChannelRequest<'_>) -> Result<Box<dyn ChannelLink>, BoxError> {
/// #         unimplemented!()
/// #     }
/// # }
/// # struct Orders;
/// # impl Contract for Orders {
/// #     const NAME: &'static str = "shop.OrderService";
/// #     type Client = Channel;
/// #     fn client(channel: Channel) -> Channel { channel }
/// # }
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientSection::from_json(&std::fs::read_to_string("clients.json")?)?;
/// let clients = Clients::builder(Arc::new(config), Arc::new(MyTransport)).build();
///
/// let ctx = CallContext::for_identity(Identity::new("alice"));
/// let orders = clients.create::<Orders>(&ctx).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Clients {
    sessions: Arc<Sessions>,
}

impl Clients {
    /// Starts building a facade over the given configuration and transport
    pub fn builder(
        config: Arc<dyn ConfigResolver>,
        transport: Arc<dyn Transport>,
    ) -> ClientsBuilder {
        ClientsBuilder {
            config,
            transport,
            store: None,
            issuer: None,
        }
    }

    /// Creates a client for the contract on behalf of the caller
    ///
    /// Federated endpoints require the context to carry an identity.
    pub async fn create<C: Contract>(&self, ctx: &CallContext) -> Result<C::Client, Error> {
        self.sessions.create_channel::<C>(ctx).await
    }

    /// Creates a client for the contract presenting `credentials`
    pub async fn create_with_credentials<C: Contract>(
        &self,
        ctx: &CallContext,
        credentials: Arc<ClientCredentials>,
    ) -> Result<C::Client, Error> {
        self.sessions
            .create_channel_with_credentials::<C>(ctx, credentials)
            .await
    }

    /// Creates a client for the contract's endpoint using binding `B`
    pub async fn create_for_binding<C: Contract, B: BindingType>(
        &self,
        ctx: &CallContext,
    ) -> Result<C::Client, Error> {
        self.sessions.create_channel_for_binding::<C, B>(ctx).await
    }

    /// The registry of channel factories
    pub fn factories(&self) -> &ChannelFactoryManager {
        self.sessions.factories()
    }

    /// The cache of issued tokens
    pub fn token_store(&self) -> &dyn TokenStore {
        &**self.sessions.store()
    }
}

impl fmt::Debug for Clients {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Clients")
            .field("factories", self.factories())
            .finish()
    }
}

/// Builder for [`Clients`]
pub struct ClientsBuilder {
    config: Arc<dyn ConfigResolver>,
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn TokenStore>>,
    issuer: Option<Arc<dyn SecurityTokenProvider>>,
}

impl ClientsBuilder {
    /// Caches issued tokens in `store`
    ///
    /// Defaults to an [`InMemoryTokenStore`].
    pub fn with_token_store(mut self, store: impl TokenStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Issues tokens over trust channels opened by `channels`
    pub fn with_trust_channel_factory<F>(self, channels: F) -> Self
    where
        F: TrustChannelFactory + 'static,
    {
        self.with_token_provider(TokenIssuer::new(channels))
    }

    /// Obtains tokens from `provider`
    pub fn with_token_provider(mut self, provider: impl SecurityTokenProvider + 'static) -> Self {
        self.issuer = Some(Arc::new(provider));
        self
    }

    /// Builds the facade
    ///
    /// Unless another source of tokens was supplied, tokens are requested
    /// from token services over HTTP.
    pub fn build(self) -> Clients {
        let factories = Arc::new(ChannelFactoryManager::new(self.config, self.transport));
        let issuer = self.issuer.unwrap_or_else(default_token_provider);
        let store: Arc<dyn TokenStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryTokenStore::new()),
        };

        Clients {
            sessions: Arc::new(SessionManager::new(factories, issuer).with_store(store)),
        }
    }
}

impl fmt::Debug for ClientsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientsBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("store", &self.store.is_some())
            .field("issuer", &self.issuer.is_some())
            .finish()
    }
}

#[cfg(feature = "http")]
fn default_token_provider() -> Arc<dyn SecurityTokenProvider> {
    Arc::new(TokenIssuer::new(
        crate::issuer::HttpTrustChannelFactory::default(),
    ))
}

#[cfg(not(feature = "http"))]
fn default_token_provider() -> Arc<dyn SecurityTokenProvider> {
    Arc::new(NoTokenService)
}

/// Refuses every request; used when no token service transport is available
#[cfg_attr(feature = "http", allow(dead_code))]
#[derive(Debug)]
struct NoTokenService;

#[async_trait]
impl SecurityTokenProvider for NoTokenService {
    async fn issue_token(
        &self,
        _: &WsFederationHttpBinding,
        _: &Url,
        _: Option<&SecurityToken>,
    ) -> Result<SecurityToken, Error> {
        Err(ConfigurationError::NoTokenService.into())
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::{
        binding::{BasicHttpBinding, NetTcpBinding},
        config::ClientSection,
        credentials::DefaultCredentials,
        provider::ChannelFactoryProvider,
        session::Identity,
        test_util::{endpoint, federation_binding, CountingIssuer, Echo, LoopbackTransport},
    };

    fn clients(config: ClientSection, issuer: Arc<CountingIssuer>) -> Clients {
        Clients::builder(Arc::new(config), Arc::new(LoopbackTransport))
            .with_token_provider(issuer)
            .build()
    }

    #[tokio::test]
    async fn plain_endpoint_creates_working_client() -> Result<()> {
        let issuer = Arc::new(CountingIssuer::default());
        let clients = clients(
            ClientSection::default()
                .with_endpoint(endpoint::<Echo>("echo", BasicHttpBinding::default().into())),
            Arc::clone(&issuer),
        );

        let client = clients.create::<Echo>(&CallContext::anonymous()).await?;

        assert_eq!(client.echo("hello").await?, "hello");
        assert_eq!(issuer.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn federated_clients_share_cached_token() -> Result<()> {
        let issuer = Arc::new(CountingIssuer::default());
        let clients = clients(
            ClientSection::default()
                .with_endpoint(endpoint::<Echo>("echo", federation_binding().into())),
            Arc::clone(&issuer),
        );
        let ctx = CallContext::for_identity(Identity::new("Alice"));

        let first = clients.create::<Echo>(&ctx).await?;
        let second = clients.clone().create::<Echo>(&ctx).await?;

        assert_eq!(issuer.calls(), 1);
        assert!(Arc::ptr_eq(
            first.channel().issued_token().expect("issued token"),
            second.channel().issued_token().expect("issued token"),
        ));
        assert!(clients.token_store().contains(
            &trustline_tokens::TokenCacheKey::from_static("Alice_http://host/svc")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn explicit_credentials_are_presented() -> Result<()> {
        let clients = clients(
            ClientSection::default()
                .with_endpoint(endpoint::<Echo>("echo", BasicHttpBinding::default().into())),
            Arc::new(CountingIssuer::default()),
        );
        let credentials = Arc::new(ClientCredentials::from(DefaultCredentials::with_user_name(
            "SomeUser", "secret",
        )));

        let client = clients
            .create_with_credentials::<Echo>(&CallContext::anonymous(), Arc::clone(&credentials))
            .await?;

        assert_eq!(client.channel().credentials(), &*credentials);
        Ok(())
    }

    #[tokio::test]
    async fn binding_filter_selects_endpoint() -> Result<()> {
        let clients = clients(
            ClientSection::default()
                .with_endpoint(endpoint::<Echo>("tcp", NetTcpBinding::default().into()))
                .with_endpoint(endpoint::<Echo>("http", BasicHttpBinding::default().into())),
            Arc::new(CountingIssuer::default()),
        );

        let client = clients
            .create_for_binding::<Echo, NetTcpBinding>(&CallContext::anonymous())
            .await?;

        assert_eq!(client.channel().address().as_str(), "http://host/svc");
        let factory = clients
            .factories()
            .get_factory_for_binding::<Echo, NetTcpBinding>()?;
        assert_eq!(factory.endpoint().name, "tcp");
        let err = clients
            .create::<Echo>(&CallContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::AmbiguousEndpoint { count: 2, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_token_service_is_reported() {
        let err = NoTokenService
            .issue_token(
                &federation_binding(),
                &Url::parse("http://host/svc").expect("valid url"),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NoTokenService)
        ));
    }
}
