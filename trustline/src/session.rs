//! Federated client sessions
//!
//! A session resolves the caller's identity, reuses a cached token issued
//! for that identity and service when one is live, and otherwise obtains a
//! new token from the token service before opening the channel.

use std::sync::{Arc, Mutex, PoisonError};

use trustline_tokens::{
    IdentityName, IdentityNameRef, InMemoryTokenStore, SecurityToken, TokenCacheKey, TokenStore,
};
use url::Url;

use crate::{
    binding::BindingType,
    channel::Contract,
    credentials::ClientCredentials,
    error::{identity_not_set, ConfigurationError, Error},
    factory::ChannelFactory,
    issuer::SecurityTokenProvider,
    provider::ChannelFactoryProvider,
};

/// An authenticated caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// The name of the identity
    pub name: IdentityName,
    /// A token proving the identity, presented to the token service as the
    /// act-as token
    pub bootstrap_token: Option<Arc<SecurityToken>>,
}

impl Identity {
    /// An identity without a bootstrap token
    pub fn new(name: impl Into<IdentityName>) -> Self {
        Self {
            name: name.into(),
            bootstrap_token: None,
        }
    }

    /// Attaches a bootstrap token to the identity
    pub fn with_bootstrap_token(mut self, token: impl Into<Arc<SecurityToken>>) -> Self {
        self.bootstrap_token = Some(token.into());
        self
    }
}

/// The context of one inbound call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    /// The identity of the caller, if authenticated
    pub identity: Option<Identity>,
}

impl CallContext {
    /// A context without an identity
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context for a call made by `identity`
    pub fn for_identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }
}

impl From<Identity> for CallContext {
    fn from(identity: Identity) -> Self {
        Self::for_identity(identity)
    }
}

/// The key under which a token issued to `identity` for the service at
/// `address` is cached
pub fn token_cache_key(identity: &IdentityNameRef, address: &Url) -> TokenCacheKey {
    TokenCacheKey::from(format!("{}_{}", identity, address.as_str()))
}

/// Opens channels for callers, obtaining and caching issued tokens for
/// federated endpoints
///
/// Cache hits never block. A miss contacts the token service without holding
/// any lock; only the final re-check and insert are serialized. Two sessions
/// racing on one key may both contact the token service, but at most one of
/// the issued tokens is cached. The other is still returned to its caller.
#[derive(Debug)]
pub struct SessionManager<P, I, S = InMemoryTokenStore> {
    factories: P,
    issuer: I,
    store: S,
    cache_lock: Mutex<()>,
}

impl<P, I> SessionManager<P, I> {
    /// Constructs a session manager caching tokens in memory
    pub fn new(factories: P, issuer: I) -> Self {
        Self {
            factories,
            issuer,
            store: InMemoryTokenStore::new(),
            cache_lock: Mutex::new(()),
        }
    }
}

impl<P, I, S> SessionManager<P, I, S> {
    /// Caches tokens in `store` instead
    pub fn with_store<T>(self, store: T) -> SessionManager<P, I, T> {
        SessionManager {
            factories: self.factories,
            issuer: self.issuer,
            store,
            cache_lock: self.cache_lock,
        }
    }

    /// The provider of channel factories
    pub fn factories(&self) -> &P {
        &self.factories
    }

    /// The token store
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<P, I, S> SessionManager<P, I, S>
where
    P: ChannelFactoryProvider,
    I: SecurityTokenProvider,
    S: TokenStore,
{
    /// Gets a token for the caller to present to the factory's service
    ///
    /// A live cached token is returned without contacting the token service.
    #[tracing::instrument(
        err,
        skip(self, factory, ctx),
        fields(
            service = %factory.address(),
            identity = tracing::field::Empty,
        ),
    )]
    pub async fn security_token<C>(
        &self,
        factory: &ChannelFactory<C>,
        ctx: &CallContext,
    ) -> Result<Arc<SecurityToken>, Error> {
        let identity = ctx.identity.as_ref().ok_or_else(identity_not_set)?;
        tracing::Span::current().record("identity", tracing::field::display(&identity.name));

        let key = token_cache_key(&identity.name, factory.address());
        if let Some(token) = self.store.get(&key) {
            tracing::trace!(%key, "using cached token");
            return Ok(token);
        }

        let binding = factory
            .binding()
            .as_federation()
            .ok_or(ConfigurationError::MissingIssuerBinding)?;

        tracing::debug!(%key, "no cached token, requesting from token service");
        let token = Arc::new(
            self.issuer
                .issue_token(
                    binding,
                    factory.address(),
                    identity.bootstrap_token.as_deref(),
                )
                .await?,
        );

        self.cache_if_absent(key, &token);
        Ok(token)
    }

    fn cache_if_absent(&self, key: TokenCacheKey, token: &Arc<SecurityToken>) {
        let _guard = self
            .cache_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.store.contains(&key) {
            tracing::debug!(%key, "token already cached by another session");
            return;
        }

        let expiry = token.valid_to();
        if self.store.add(key.clone(), Arc::clone(token), expiry) {
            tracing::debug!(%key, expiry = expiry.0, "cached newly issued token");
        }
    }

    async fn open<C: Contract>(
        &self,
        factory: &ChannelFactory<C>,
        ctx: &CallContext,
    ) -> Result<C::Client, Error> {
        if factory.is_federated() {
            let token = self.security_token(factory, ctx).await?;
            factory.create_channel_with_issued_token(token)
        } else {
            factory.create_channel()
        }
    }

    /// Opens a client for the contract on behalf of the caller
    pub async fn create_channel<C: Contract>(&self, ctx: &CallContext) -> Result<C::Client, Error> {
        let factory = self.factories.get_factory::<C>()?;
        self.open(&factory, ctx).await
    }

    /// Opens a client for the contract presenting `credentials`
    pub async fn create_channel_with_credentials<C: Contract>(
        &self,
        ctx: &CallContext,
        credentials: Arc<ClientCredentials>,
    ) -> Result<C::Client, Error> {
        let factory = self.factories.get_factory_with_credentials::<C>(credentials)?;
        self.open(&factory, ctx).await
    }

    /// Opens a client for the contract's endpoint using binding `B`
    pub async fn create_channel_for_binding<C: Contract, B: BindingType>(
        &self,
        ctx: &CallContext,
    ) -> Result<C::Client, Error> {
        let factory = self.factories.get_factory_for_binding::<C, B>()?;
        self.open(&factory, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use aliri_clock::DurationSecs;
    use color_eyre::Result;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        binding::BasicHttpBinding,
        config::ClientSection,
        provider::ChannelFactoryManager,
        test_util::{endpoint, federation_binding, CountingIssuer, Echo, LoopbackTransport},
    };

    fn manager(binding: crate::binding::Binding) -> ChannelFactoryManager {
        ChannelFactoryManager::new(
            Arc::new(ClientSection::default().with_endpoint(endpoint::<Echo>("echo", binding))),
            Arc::new(LoopbackTransport),
        )
    }

    fn sessions() -> SessionManager<ChannelFactoryManager, Arc<CountingIssuer>> {
        SessionManager::new(
            manager(federation_binding().into()),
            Arc::new(CountingIssuer::default()),
        )
    }

    fn alice() -> CallContext {
        Identity::new("Alice").into()
    }

    #[test]
    fn cache_key_joins_identity_and_address() -> Result<()> {
        let key = token_cache_key(
            &IdentityName::from_static("Alice"),
            &Url::parse("http://host/svc")?,
        );
        assert_eq!(key.as_str(), "Alice_http://host/svc");
        Ok(())
    }

    #[tokio::test]
    async fn cache_hit_skips_token_service() -> Result<()> {
        let sessions = sessions();
        let cached = Arc::new(SecurityToken::valid_for("T", DurationSecs(3600)));
        sessions.store().add(
            TokenCacheKey::from_static("Alice_http://host/svc"),
            Arc::clone(&cached),
            cached.valid_to(),
        );
        let factory = sessions.factories().get_factory::<Echo>()?;

        let token = sessions.security_token(&factory, &alice()).await?;

        assert!(Arc::ptr_eq(&token, &cached));
        assert_eq!(sessions.issuer.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn cache_miss_issues_and_caches_token() -> Result<()> {
        let sessions = sessions();
        let factory = sessions.factories().get_factory::<Echo>()?;

        let token = sessions
            .security_token(&factory, &Identity::new("Bob").into())
            .await?;

        assert_eq!(sessions.issuer.calls(), 1);
        let cached = sessions
            .store()
            .get(&TokenCacheKey::from_static("Bob_http://host/svc"))
            .expect("token should be cached");
        assert!(Arc::ptr_eq(&token, &cached));
        assert_eq!(token.material().as_str(), "issued-1");
        assert!(logs_contain("cached newly issued token"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_identity_is_security_error() -> Result<()> {
        let sessions = sessions();
        let factory = sessions.factories().get_factory::<Echo>()?;

        let err = sessions
            .security_token(&factory, &CallContext::anonymous())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Identity must be set");
        assert!(matches!(err, Error::Security(ref e) if e.message() == "Identity must be set"));
        assert_eq!(sessions.issuer.calls(), 0);
        assert!(sessions.store().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_token_is_presented_as_act_as() -> Result<()> {
        let sessions = sessions();
        let factory = sessions.factories().get_factory::<Echo>()?;
        let ctx: CallContext = Identity::new("Carol")
            .with_bootstrap_token(SecurityToken::valid_for("bootstrap", DurationSecs(60)))
            .into();

        sessions.security_token(&factory, &ctx).await?;

        assert_eq!(sessions.issuer.act_as(), vec![Some("bootstrap".to_owned())]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_issuance_is_not_cached() -> Result<()> {
        let sessions = SessionManager::new(
            manager(federation_binding().into()),
            Arc::new(CountingIssuer::failing()),
        );
        let factory = sessions.factories().get_factory::<Echo>()?;

        let err = sessions.security_token(&factory, &alice()).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(sessions.issuer.calls(), 1);
        assert!(sessions.store().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn federated_channel_presents_issued_token() -> Result<()> {
        let sessions = sessions();

        let client = sessions.create_channel::<Echo>(&alice()).await?;

        let token = client.channel().issued_token().expect("issued token");
        assert_eq!(token.material().as_str(), "issued-1");
        assert!(client.channel().credentials().is_federated());
        assert_eq!(client.echo("ping").await?, "ping");
        Ok(())
    }

    #[tokio::test]
    async fn plain_channel_needs_no_identity() -> Result<()> {
        let sessions = SessionManager::new(
            manager(BasicHttpBinding::default().into()),
            Arc::new(CountingIssuer::default()),
        );

        let client = sessions
            .create_channel::<Echo>(&CallContext::anonymous())
            .await?;

        assert!(client.channel().issued_token().is_none());
        assert_eq!(sessions.issuer.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn binding_filtered_channel_uses_session() -> Result<()> {
        let sessions = sessions();

        let client = sessions
            .create_channel_for_binding::<Echo, crate::binding::WsFederationHttpBinding>(&alice())
            .await?;

        assert!(client.channel().issued_token().is_some());
        assert_eq!(sessions.issuer.calls(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_cache_one_token() -> Result<()> {
        const SESSIONS: usize = 16;
        let sessions = Arc::new(sessions());
        let factory = sessions.factories().get_factory::<Echo>()?;

        let handles: Vec<_> = (0..SESSIONS)
            .map(|_| {
                let sessions = Arc::clone(&sessions);
                let factory = Arc::clone(&factory);
                tokio::spawn(async move {
                    sessions
                        .security_token(&factory, &alice())
                        .await
                        .map_err(|e| e.to_string())
                })
            })
            .collect();

        let mut tokens = Vec::with_capacity(SESSIONS);
        for handle in handles {
            tokens.push(handle.await?.map_err(color_eyre::eyre::Report::msg)?);
        }

        let calls = sessions.issuer.calls();
        assert!((1..=SESSIONS).contains(&calls));
        assert_eq!(sessions.store().len(), 1);

        let cached = sessions
            .store()
            .get(&TokenCacheKey::from_static("Alice_http://host/svc"))
            .expect("token should be cached");
        let matching = tokens.iter().filter(|t| Arc::ptr_eq(t, &cached)).count();
        assert!(matching >= 1);
        assert_eq!(SESSIONS - matching, calls - 1);
        Ok(())
    }
}
