//! The registry of channel factories

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use arc_swap::ArcSwap;

use crate::{
    binding::BindingType,
    channel::{Contract, Transport},
    config::{resolve_endpoint, ConfigResolver},
    credentials::ClientCredentials,
    error::Error,
    factory::ChannelFactory,
};

/// A source of channel factories for contracts
pub trait ChannelFactoryProvider: Send + Sync {
    /// Gets the shared factory for the contract
    ///
    /// The factory is constructed on first use and reused afterwards.
    fn get_factory<C: Contract>(&self) -> Result<Arc<ChannelFactory<C>>, Error>;

    /// Constructs a new factory for the contract presenting `credentials`
    ///
    /// Factories with explicit credentials are never shared.
    fn get_factory_with_credentials<C: Contract>(
        &self,
        credentials: Arc<ClientCredentials>,
    ) -> Result<Arc<ChannelFactory<C>>, Error>;

    /// Gets the shared factory for the contract's endpoint using binding `B`
    fn get_factory_for_binding<C: Contract, B: BindingType>(
        &self,
    ) -> Result<Arc<ChannelFactory<C>>, Error>;
}

impl<P: ChannelFactoryProvider + ?Sized> ChannelFactoryProvider for Arc<P> {
    fn get_factory<C: Contract>(&self) -> Result<Arc<ChannelFactory<C>>, Error> {
        (**self).get_factory::<C>()
    }

    fn get_factory_with_credentials<C: Contract>(
        &self,
        credentials: Arc<ClientCredentials>,
    ) -> Result<Arc<ChannelFactory<C>>, Error> {
        (**self).get_factory_with_credentials::<C>(credentials)
    }

    fn get_factory_for_binding<C: Contract, B: BindingType>(
        &self,
    ) -> Result<Arc<ChannelFactory<C>>, Error> {
        (**self).get_factory_for_binding::<C, B>()
    }
}

type RegistryKey = (TypeId, Option<&'static str>);
type Registry = HashMap<RegistryKey, Arc<dyn Any + Send + Sync>>;

/// Constructs channel factories from endpoint configuration and keeps one
/// per contract
///
/// Factories are never evicted. When two callers race to construct the
/// factory for one contract, both may build one, but only the first to be
/// registered is ever handed out.
pub struct ChannelFactoryManager {
    config: Arc<dyn ConfigResolver>,
    transport: Arc<dyn Transport>,
    factories: ArcSwap<Registry>,
}

impl ChannelFactoryManager {
    /// Constructs an empty registry
    pub fn new(config: Arc<dyn ConfigResolver>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            factories: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// The number of registered factories
    pub fn len(&self) -> usize {
        self.factories.load().len()
    }

    /// Whether no factories have been registered
    pub fn is_empty(&self) -> bool {
        self.factories.load().is_empty()
    }

    fn create_factory<C: Contract>(
        &self,
        binding: Option<&'static str>,
    ) -> Result<ChannelFactory<C>, Error> {
        let endpoint = resolve_endpoint(&*self.config, C::NAME, binding)?;
        let factory = ChannelFactory::new(endpoint, Arc::clone(&self.transport));
        if factory.is_federated() {
            factory.configure_for_federation();
        }

        tracing::debug!(
            contract = C::NAME,
            endpoint = %factory.endpoint().name,
            binding = factory.binding().name(),
            federated = factory.is_federated(),
            "created channel factory"
        );

        Ok(factory)
    }

    fn registered<C: Contract>(&self, key: &RegistryKey) -> Option<Arc<ChannelFactory<C>>> {
        self.factories
            .load()
            .get(key)
            .cloned()
            .and_then(|f| f.downcast::<ChannelFactory<C>>().ok())
    }

    fn get_or_register<C: Contract>(
        &self,
        binding: Option<&'static str>,
    ) -> Result<Arc<ChannelFactory<C>>, Error> {
        let key = (TypeId::of::<C>(), binding);
        if let Some(factory) = self.registered::<C>(&key) {
            tracing::trace!(contract = C::NAME, "using registered channel factory");
            return Ok(factory);
        }

        let candidate = Arc::new(self.create_factory::<C>(binding)?);
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(&candidate) as _;
        self.factories.rcu(|current| {
            if current.contains_key(&key) {
                Arc::clone(current)
            } else {
                let mut next = Registry::clone(current);
                next.insert(key, Arc::clone(&erased));
                Arc::new(next)
            }
        });

        match self.registered::<C>(&key) {
            Some(winner) => {
                if !Arc::ptr_eq(&winner, &candidate) {
                    tracing::debug!(
                        contract = C::NAME,
                        "discarding channel factory; another was registered first"
                    );
                }
                Ok(winner)
            }
            None => Ok(candidate),
        }
    }
}

impl ChannelFactoryProvider for ChannelFactoryManager {
    fn get_factory<C: Contract>(&self) -> Result<Arc<ChannelFactory<C>>, Error> {
        self.get_or_register::<C>(None)
    }

    fn get_factory_with_credentials<C: Contract>(
        &self,
        credentials: Arc<ClientCredentials>,
    ) -> Result<Arc<ChannelFactory<C>>, Error> {
        let factory = self.create_factory::<C>(None)?;
        factory.replace_credentials(credentials);
        Ok(Arc::new(factory))
    }

    fn get_factory_for_binding<C: Contract, B: BindingType>(
        &self,
    ) -> Result<Arc<ChannelFactory<C>>, Error> {
        self.get_or_register::<C>(Some(B::NAME))
    }
}

impl fmt::Debug for ChannelFactoryManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChannelFactoryManager")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("factories", &self.factories.load().len())
            .finish()
    }
}
