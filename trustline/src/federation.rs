//! Detecting and configuring federated channel factories

use std::sync::Arc;

use crate::{
    binding::Binding,
    credentials::{ClientCredentials, FederatedCredentials},
    factory::ChannelFactory,
};

impl<C> ChannelFactory<C> {
    /// Whether the factory's endpoint uses the federation binding
    pub fn is_federated(&self) -> bool {
        matches!(self.binding(), Binding::WsFederationHttp(_))
    }

    /// Whether federated credentials are attached to the factory
    pub fn is_configured_for_federation(&self) -> bool {
        self.credentials.load().is_federated()
    }

    /// Attaches federated credentials to the factory
    ///
    /// The federated credentials wrap whatever default credentials were
    /// attached. Has no effect if federated credentials are already attached.
    pub fn configure_for_federation(&self) {
        self.credentials.rcu(|current| match &**current {
            ClientCredentials::Federated(_) => Arc::clone(current),
            ClientCredentials::Default(defaults) => Arc::new(ClientCredentials::Federated(
                FederatedCredentials::new(defaults.clone()),
            )),
        });
    }

    /// Detaches the current credentials and attaches `credentials`
    ///
    /// All channels subsequently created by the factory present the new
    /// credentials.
    pub fn replace_credentials(&self, credentials: Arc<ClientCredentials>) {
        let previous = self.credentials.swap(credentials);
        tracing::trace!(
            previous.federated = previous.is_federated(),
            "replaced client credentials"
        );
    }
}
