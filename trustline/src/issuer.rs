//! Obtaining tokens from a security token service

use std::{error, fmt, sync::Arc};

use async_trait::async_trait;
use trustline_tokens::{
    trust::{RequestSecurityToken, TrustChannel},
    SecurityToken,
};
use url::Url;

use crate::{
    binding::{Binding, WsFederationHttpBinding, WsHttpBinding},
    error::{BoxError, ConfigurationError, Error},
};

/// Opens trust channels to token services
pub trait TrustChannelFactory: Send + Sync + fmt::Debug {
    /// The channel type produced
    type Channel: TrustChannel;

    /// Opens a channel to the token service at `issuer_address`
    fn create_channel(
        &self,
        issuer_binding: &WsHttpBinding,
        issuer_address: &Url,
    ) -> Result<Self::Channel, BoxError>;
}

/// A source of tokens for federated endpoints
#[async_trait]
pub trait SecurityTokenProvider: Send + Sync {
    /// Obtains a token for the service at `service_address` from the token
    /// service configured on `binding`
    async fn issue_token(
        &self,
        binding: &WsFederationHttpBinding,
        service_address: &Url,
        act_as: Option<&SecurityToken>,
    ) -> Result<SecurityToken, Error>;
}

#[async_trait]
impl<T: SecurityTokenProvider + ?Sized> SecurityTokenProvider for Arc<T> {
    async fn issue_token(
        &self,
        binding: &WsFederationHttpBinding,
        service_address: &Url,
        act_as: Option<&SecurityToken>,
    ) -> Result<SecurityToken, Error> {
        (**self).issue_token(binding, service_address, act_as).await
    }
}

/// Issues tokens by sending issue requests over trust channels
///
/// No retries are attempted. Failures of the token service are returned
/// to the caller as they were raised.
#[derive(Debug)]
pub struct TokenIssuer<F> {
    channels: F,
}

impl<F: TrustChannelFactory> TokenIssuer<F> {
    /// Constructs an issuer which opens channels with `channels`
    pub fn new(channels: F) -> Self {
        Self { channels }
    }

    /// Opens a trust channel to the token service
    pub fn create_channel(
        &self,
        issuer_binding: &WsHttpBinding,
        issuer_address: &Url,
    ) -> Result<F::Channel, Error> {
        self.channels
            .create_channel(issuer_binding, issuer_address)
            .map_err(Error::Transport)
    }

    /// Sends an issue request over an open trust channel
    pub async fn issue_on_channel<T: TrustChannel>(
        &self,
        channel: &T,
        request: &RequestSecurityToken,
    ) -> Result<SecurityToken, Error> {
        match channel.issue(request).await {
            Ok(response) => Ok(response.into_security_token()),
            Err(err) => {
                tracing::warn!(
                    error = (&err as &dyn error::Error),
                    applies_to = %request.applies_to,
                    "token service rejected issue request"
                );
                Err(Error::transport(err))
            }
        }
    }

    /// Sends `request` to the token service at `issuer_address`
    pub async fn issue(
        &self,
        issuer_binding: &WsHttpBinding,
        issuer_address: &Url,
        request: &RequestSecurityToken,
    ) -> Result<SecurityToken, Error> {
        let channel = self.create_channel(issuer_binding, issuer_address)?;
        self.issue_on_channel(&channel, request).await
    }

    /// Obtains a token for `service_address` from the token service at
    /// `issuer_address`, optionally acting as, or on behalf of, another
    /// identity
    pub async fn issue_for_service(
        &self,
        issuer_binding: &WsHttpBinding,
        issuer_address: &Url,
        service_address: &Url,
        act_as: Option<&SecurityToken>,
        on_behalf_of: Option<&SecurityToken>,
    ) -> Result<SecurityToken, Error> {
        let request = issue_request(service_address, act_as, on_behalf_of);
        self.issue(issuer_binding, issuer_address, &request).await
    }
}

/// Builds an issue request scoped to `service_address`
pub fn issue_request(
    service_address: &Url,
    act_as: Option<&SecurityToken>,
    on_behalf_of: Option<&SecurityToken>,
) -> RequestSecurityToken {
    let mut request = RequestSecurityToken::issue(service_address.clone());
    if let Some(token) = act_as {
        request = request.with_act_as(token);
    }

    if let Some(token) = on_behalf_of {
        request = request.with_on_behalf_of(token);
    }

    request
}

#[async_trait]
impl<F: TrustChannelFactory> SecurityTokenProvider for TokenIssuer<F> {
    #[tracing::instrument(
        err,
        skip(self, binding, act_as),
        fields(
            service = %service_address,
            has_act_as = act_as.is_some(),
        ),
    )]
    async fn issue_token(
        &self,
        binding: &WsFederationHttpBinding,
        service_address: &Url,
        act_as: Option<&SecurityToken>,
    ) -> Result<SecurityToken, Error> {
        let issuer_binding = match binding.issuer_binding.as_deref() {
            Some(Binding::WsHttp(b)) => b,
            _ => return Err(ConfigurationError::MissingIssuerBinding.into()),
        };
        let issuer_address = binding
            .issuer_address
            .as_ref()
            .ok_or(ConfigurationError::MissingIssuerAddress)?;

        let mut request = issue_request(service_address, act_as, None);
        if let Some(token_type) = &binding.token_type {
            request = request.with_token_type(token_type.as_str());
        }

        let token = self.issue(issuer_binding, issuer_address, &request).await?;

        tracing::info!(
            issuer = %issuer_address,
            valid_from = token.valid_from().0,
            valid_to = token.valid_to().0,
            "issued new token"
        );

        Ok(token)
    }
}

#[cfg(feature = "http")]
mod http {
    use trustline_tokens::trust::HttpTrustChannel;
    use url::Url;

    use super::TrustChannelFactory;
    use crate::{binding::WsHttpBinding, error::BoxError};

    /// Opens trust channels which exchange requests over HTTP
    #[derive(Clone, Debug, Default)]
    pub struct HttpTrustChannelFactory {
        client: reqwest::Client,
    }

    impl HttpTrustChannelFactory {
        /// Constructs a factory sending requests with `client`
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl TrustChannelFactory for HttpTrustChannelFactory {
        type Channel = HttpTrustChannel;

        fn create_channel(
            &self,
            issuer_binding: &WsHttpBinding,
            issuer_address: &Url,
        ) -> Result<Self::Channel, BoxError> {
            let channel = HttpTrustChannel::new(self.client.clone(), issuer_address.clone());
            Ok(match issuer_binding.send_timeout {
                Some(timeout) => channel.with_timeout(timeout.into()),
                None => channel,
            })
        }
    }

}

#[cfg(feature = "http")]
pub use http::HttpTrustChannelFactory;
