//! Trust negotiation with a security token service

use aliri_clock::UnixTime;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error;
use url::Url;

use crate::{SecurityToken, TokenMaterial};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpTrustChannel, TrustRequestError};

/// The kind of operation requested of a security token service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// Issue a new token
    #[serde(rename = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Issue")]
    Issue,
    /// Renew an existing token
    #[serde(rename = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Renew")]
    Renew,
    /// Cancel an existing token
    #[serde(rename = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Cancel")]
    Cancel,
    /// Validate an existing token
    #[serde(rename = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Validate")]
    Validate,
}

/// A token carried inside a request, such as an act-as token
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenElement {
    /// The token material
    pub material: TokenMaterial,
    /// The token type, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl From<&SecurityToken> for TokenElement {
    fn from(token: &SecurityToken) -> Self {
        Self {
            material: token.material().to_owned(),
            token_type: token.token_type().map(ToOwned::to_owned),
        }
    }
}

/// A request for a security token
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestSecurityToken {
    /// The requested operation
    pub request_type: RequestType,
    /// The address of the service the token is scoped to
    pub applies_to: Url,
    /// A token for the identity the requester is acting as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act_as: Option<TokenElement>,
    /// A token for the identity the requester is acting on behalf of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<TokenElement>,
    /// The type of token requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl RequestSecurityToken {
    /// Constructs an issue request for a token scoped to `applies_to`
    pub fn issue(applies_to: Url) -> Self {
        Self {
            request_type: RequestType::Issue,
            applies_to,
            act_as: None,
            on_behalf_of: None,
            token_type: None,
        }
    }

    /// Requests that the token be issued to act as the identity in `token`
    pub fn with_act_as(mut self, token: &SecurityToken) -> Self {
        self.act_as = Some(token.into());
        self
    }

    /// Requests that the token be issued on behalf of the identity in `token`
    pub fn with_on_behalf_of(mut self, token: &SecurityToken) -> Self {
        self.on_behalf_of = Some(token.into());
        self
    }

    /// Requests a specific token type
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }
}

/// The validity period of an issued token
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lifetime {
    /// When the token was created
    pub created: UnixTime,
    /// When the token expires
    pub expires: UnixTime,
}

/// The response to a request for a security token
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestSecurityTokenResponse {
    /// The requested token
    pub requested_security_token: TokenMaterial,
    /// The token's validity period
    pub lifetime: Lifetime,
    /// The type of the issued token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl RequestSecurityTokenResponse {
    /// Converts the response into the security token it grants
    pub fn into_security_token(self) -> SecurityToken {
        let token = SecurityToken::new(
            self.requested_security_token,
            self.lifetime.created,
            self.lifetime.expires,
        );

        match self.token_type {
            Some(token_type) => token.with_token_type(token_type),
            None => token,
        }
    }
}

/// A channel to a security token service
#[async_trait]
pub trait TrustChannel: Send + Sync {
    /// The error type returned in the event that the exchange fails
    type Error: error::Error + Send + Sync + 'static;

    /// Sends an issue request to the token service
    async fn issue(
        &self,
        request: &RequestSecurityToken,
    ) -> Result<RequestSecurityTokenResponse, Self::Error>;
}
